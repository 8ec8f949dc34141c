fn main() {
    if let Err(e) = notegrid_lib::run() {
        eprintln!("notegrid: {}", e);
        std::process::exit(1);
    }
}
