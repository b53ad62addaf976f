fn main() -> anyhow::Result<()> {
    fble_cli::run(std::env::args_os())
}
