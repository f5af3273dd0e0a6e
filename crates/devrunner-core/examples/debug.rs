use devrunner_core::{tools, Paths, ToolChecker, WhichChecker};

fn main() {
    let paths = Paths::new();
    println!("=== Paths ===");
    println!("global config: {}", paths.global_config().display());
    println!("update state:  {}", paths.update_state().display());

    println!("\n=== Tools ===");
    for name in &["npm", "yarn", "cargo", "python", "make"] {
        let installed = WhichChecker.is_installed(name);
        let version = tools::tool_version(name).unwrap_or_else(|| "-".to_string());
        println!("{}: {} ({})", name, installed, version);
    }
}
