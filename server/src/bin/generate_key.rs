use age::{secrecy::ExposeSecret as _, x25519::Identity};
use color_eyre::eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;

    // Generate a new age identity for sealing session cookies
    let identity = Identity::generate();

    let key_string = identity.to_string();
    let key_string = key_string.expose_secret();

    println!("Generated session sealing key:");
    print!("{}", key_string);
    println!();
    println!();
    println!("Use this as your SESSION_ENCRYPTION_KEY environment variable.");
    println!("For example, add the following to your .env file:");
    print!("SESSION_ENCRYPTION_KEY=\"{}\"", key_string);
    println!();

    Ok(())
}
