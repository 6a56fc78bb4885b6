use clap::Parser;
use pic_namelist::control;
use pic_namelist::namelist::read_toml;

#[derive(Parser)]
pub struct CommandLineArguments {
    /// Path to the namelist file
    #[clap(long, short)]
    toml: String,

    /// Rank of this process; only rank 0 creates the output directory
    #[clap(long, default_value_t = 0)]
    rank: u32,
}

fn main() -> anyhow::Result<()> {
    // Parse path to toml
    let args = CommandLineArguments::parse();

    // Load and validate the namelist
    let mut namelist = read_toml(&args.toml)?;
    control::check(&mut namelist, args.rank)?;

    // Print run parameters
    println!("Run Parameters\n{}", namelist.main);
    println!(
        "{} species, {} laser(s), {} antenna(s), {} collision block(s)",
        namelist.species.len(),
        namelist.laser.len(),
        namelist.antenna.len(),
        namelist.collisions.len(),
    );

    // Tell the engine whether it may tear down the interpreter
    if control::keep_interpreter_resident(&namelist) {
        println!("interpreter: must stay resident during the run");
    } else {
        println!("interpreter: may be torn down before time stepping");
    }

    Ok(())
}
