fn main() -> anyhow::Result<()> {
    formula_row::cli::run()
}
