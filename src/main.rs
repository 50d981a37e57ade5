fn main() {
    if let Err(e) = arkhiv::run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
