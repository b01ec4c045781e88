fn main() {
    if let Err(err) = sheet_frames::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
