//! Blink the LED on the first USB-1608FS-Plus found.

use usb1608fs_plus::Usb1608fsPlus;

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> usb1608fs_plus::Result<()> {
    let daq = Usb1608fsPlus::first_device()?;
    println!("Found {}", daq);
    println!("Status: 0x{:02x}", daq.status()?);
    daq.blink_led(5)?;
    Ok(())
}
