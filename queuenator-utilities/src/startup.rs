use std::env;

use log::info;
use queuenator_models::errors::SendableError;

use crate::{
    dirutils,
    logger::{self, print_env},
};

pub fn startup(name: &str, log_file: &str) -> Result<(), SendableError> {
    unsafe {
        env::set_var("RUST_BACKTRACE", "1");
    }
    dirutils::set_exe_dir_as_cwd()?;
    logger::setup_logger(log_file)?;
    log_panics::init();

    info!("--- {} ---", name);
    print_env()?;

    Ok(())
}
