/// Display version information
pub fn execute() {
    println!("wamd {}", env!("CARGO_PKG_VERSION"));
    println!("Multi-tenant messaging session gateway");
}
