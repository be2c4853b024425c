fn main() {
    if let Err(err) = clinic_ingest::run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
