//! Binary entry point: decode the arguments, run the engine, and map any
//! failure to its single stderr line and exit code 1.

use std::process;

use xv6_fsck::driver;
use xv6_fsck::error::FsckError;

fn main() {
    env_logger::init();
    let mode = match driver::parse_args(std::env::args()) {
        Ok(mode) => mode,
        Err(err) => fail(err),
    };
    if let Err(err) = driver::run(mode) {
        fail(err);
    }
}

fn fail(err: FsckError) -> ! {
    eprintln!("{}", err);
    process::exit(1);
}
