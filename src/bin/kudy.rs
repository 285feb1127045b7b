fn main() -> anyhow::Result<()> {
    kudy::cli::run_cli()
}
