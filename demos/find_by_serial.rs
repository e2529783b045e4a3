//! Open a specific USB-1608FS-Plus by serial number.
//!
//! Multiple devices can be driven independently from one host; each gets
//! its own handle, gain table, and channel state.

use usb1608fs_plus::{Usb1608fsPlus, VoltageRange};

fn main() {
    env_logger::init();

    let serial = match std::env::args().nth(1) {
        Some(serial) => serial,
        None => {
            eprintln!("usage: find_by_serial <serial-number>");
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&serial) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(serial: &str) -> usb1608fs_plus::Result<()> {
    let daq = Usb1608fsPlus::find_by_serial(serial)?;
    println!("Found {}", daq);

    // Single conversion on channel 0 at ±10V
    let word = daq.read_analog_input(0, VoltageRange::Range10V)?;
    let volts = usb1608fs_plus::raw_volts_from_word(word, VoltageRange::Range10V);
    println!("channel 0: 0x{:04x} ({:.5} V raw)", word, volts);
    Ok(())
}
