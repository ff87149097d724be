fn main() {
    if let Err(failure) = openapi_check::run_live() {
        std::process::exit(failure.exit_code());
    }
}
