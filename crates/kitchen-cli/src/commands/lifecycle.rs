//! Development workflow commands: disable, uninstall and unlink.

use colored::Colorize;
use kitchen_extensions::Installer;
use kitchen_extensions::catalog::validate_name;

use crate::context::KitchenContext;
use crate::error::Result;

pub fn run_disable(ctx: &KitchenContext, name: &str) -> Result<()> {
    validate_name(name)?;
    Installer::new(&ctx.host).disable(name)?;
    println!("{} Disabled {}", "=>".blue().bold(), name.cyan());
    Ok(())
}

/// Uninstall `name`, disabling it first when `disable` is set.
pub fn run_uninstall(ctx: &KitchenContext, name: &str, disable: bool) -> Result<()> {
    validate_name(name)?;
    let installer = Installer::new(&ctx.host);
    if disable {
        installer.disable(name)?;
        println!("{} Disabled {}", "=>".blue().bold(), name.cyan());
    }
    installer.uninstall(name)?;
    println!("{} Uninstalled {}", "=>".blue().bold(), name.cyan());
    Ok(())
}

/// Remove the link or copy of `name` from the extensions root.
pub fn run_unlink(ctx: &KitchenContext, name: &str) -> Result<()> {
    if ctx.linker.unlink(name)? {
        println!("{} Unlinked {}", "=>".blue().bold(), name.cyan());
    } else {
        println!("{} {} is not linked", "=>".blue().bold(), name.cyan());
    }
    Ok(())
}
