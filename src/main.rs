fn main() {
    if let Err(code) = draftsmith::cli::run() {
        std::process::exit(code.as_i32());
    }
}
