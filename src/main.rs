fn main() -> Result<(), Box<dyn std::error::Error>> {
    sensai::cli::main()
}
