//! Analog Input Scan Example
//!
//! This example demonstrates a full acquisition cycle:
//! - Opening the first USB-1608FS-Plus found
//! - Building the gain table from calibration memory
//! - Configuring channels from a JSON snippet
//! - Running a continuous scan and converting samples to volts

use std::time::Instant;

use usb1608fs_plus::{AnalogConfig, Usb1608fsPlus};

const CONFIG: &str = r#"{
    "freq": 10000.0,
    "block_transfer": true,
    "trigger": "none",
    "ext_pacer": false,
    "output_sync": false,
    "debug_mode": false,
    "stall_overrun": true,
    "channels": [
        { "enabled": true, "range": "10V", "desc": "channel 0" },
        { "enabled": true, "range": "10V", "desc": "channel 1" }
    ]
}"#;

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
    println!("Serial number: {}", daq.serial_number()?);

    let mut ai = daq.new_analog_input()?;
    AnalogConfig::from_json(CONFIG)?.apply(&mut ai)?;
    ai.set_scan_ranges()?;
    println!("Ranges: {:02x?}", ai.scan_ranges()?);

    const SCANS_PER_BUFFER: usize = 256;
    const TOTAL_BUFFERS: usize = 10;

    ai.start_scan(0)?; // scan continuously until stopped
    let start = Instant::now();
    let mut total_bytes = 0;

    for _ in 0..TOTAL_BUFFERS {
        let data = match ai.read_scan(SCANS_PER_BUFFER) {
            Ok(data) => data,
            Err(e) if e.is_retryable() => {
                eprintln!("retryable scan error, restarting: {}", e);
                ai.start_scan(0)?;
                continue;
            }
            Err(e) => {
                ai.stop_scan()?;
                return Err(e);
            }
        };
        total_bytes += data.len();

        let volts = ai.voltages(&data)?;
        for (ch, row) in volts.iter().enumerate() {
            println!(
                "enabled channel {}: first {:.5} V, last {:.5} V",
                ch,
                row[0],
                row[row.len() - 1]
            );
        }
    }

    let elapsed = start.elapsed();
    println!("Read {} bytes in {:.2} s", total_bytes, elapsed.as_secs_f64());

    ai.stop_scan()?;
    Ok(())
}
