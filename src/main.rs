use anyhow::{Context, Result};
use getopts::Options;
use log::debug;
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::env;
use std::process;
use std::time::Duration;

const DEFAULT_ITERATIONS: u32 = 60;
const DEFAULT_INTERVAL_MS: u64 = 1000;

static SURVIVAL_MESSAGE: &[u8] = b"I won't die that easily!\n";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    let mut opts = Options::new();
    opts.optflag("h", "help", "print this help menu");
    opts.optopt("n", "iterations", "number of loop iterations", "COUNT");
    opts.optopt("i", "interval", "milliseconds slept per iteration", "MS");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(why) => {
            eprintln!("{:?}: {}", &args[0], why);
            process::exit(1);
        }
    };

    if matches.opt_present("h") {
        println!("Usage: {:?} [-n COUNT] [-i MS]", &args[0]);
        process::exit(0);
    }

    let iterations: u32 = match matches.opt_str("n") {
        Some(n) => n.parse().context("iteration count must be a number")?,
        None => DEFAULT_ITERATIONS,
    };

    let interval_ms: u64 = match matches.opt_str("i") {
        Some(ms) => ms.parse().context("interval must be whole milliseconds")?,
        None => DEFAULT_INTERVAL_MS,
    };

    install_signal_handlers()?;
    debug!("SIGINT handler installed");

    do_survive(iterations, Duration::from_millis(interval_ms));
    debug!("finished {} iterations", iterations);

    Ok(())
}

fn install_signal_handlers() -> Result<()> {
    trap_signal(Signal::SIGINT, handle_interrupt).context("couldn't trap SIGINT")?;

    Ok(())
}

fn trap_signal(sig: Signal, handler: extern "C" fn(i32)) -> Result<()> {
    // no SA_RESTART: an arriving signal should cut the sleep short
    let act = SigAction::new(
        SigHandler::Handler(handler),
        SaFlags::empty(),
        SigSet::empty(),
    );

    unsafe { sigaction(sig, &act) }?;

    Ok(())
}

// runs on SIGINT delivery, at whatever point the main flow happens to be;
// write(2) is async-signal-safe, println! is not
extern "C" fn handle_interrupt(_signum: i32) {
    unsafe {
        libc::write(
            libc::STDOUT_FILENO,
            SURVIVAL_MESSAGE.as_ptr() as *const libc::c_void,
            SURVIVAL_MESSAGE.len(),
        );
    }
}

fn do_survive(iterations: u32, interval: Duration) {
    let mut i = 0;
    while i < iterations {
        println!("sleep {}", i);
        interruptible_sleep(interval);

        i += 1;
    }
}

// suspends the calling thread for up to dur; returns early when a handled
// signal arrives, and the caller simply moves on to its next iteration
fn interruptible_sleep(dur: Duration) {
    let req = libc::timespec {
        tv_sec: dur.as_secs() as libc::time_t,
        tv_nsec: dur.subsec_nanos() as libc::c_long,
    };

    unsafe { libc::nanosleep(&req, std::ptr::null_mut()) };
}
