fn main() -> anyhow::Result<()> {
    netpanel_cli::run()
}
