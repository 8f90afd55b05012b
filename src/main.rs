fn main() -> anyhow::Result<()> {
    ortholink_lib::run()
}
