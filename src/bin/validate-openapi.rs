fn main() {
    if let Err(failure) = openapi_check::run_static() {
        std::process::exit(failure.exit_code());
    }
}
