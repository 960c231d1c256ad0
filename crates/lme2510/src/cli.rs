//! CLI subcommands — device discovery, cold/warm probing, firmware
//! flashing and one-shot I2C transactions.

use std::path::PathBuf;

use clap::Subcommand;

use lme2510_lib::Lme2510;
use lme2510_lib::error::{BridgeError, Result};
use lme2510_lib::firmware::FirmwareImage;
use lme2510_lib::i2c::I2cMessage;
use lme2510_lib::identify::{DeviceState, identify};
use lme2510_lib::transport::{self, UsbTransport};

#[derive(Subcommand)]
pub enum Command {
    /// List attached LME2510C devices
    Devices,
    /// Probe the device's firmware state (cold or warm)
    Identify,
    /// Upload a firmware image to a cold device
    Flash {
        /// Firmware image, e.g. dvb-usb-lme2510c-0.fw
        file: PathBuf,
    },
    /// Read bytes from an I2C address behind the bridge
    I2cRead {
        /// 7-bit address, e.g. 0x64
        #[arg(value_parser = parse_u8)]
        addr: u8,
        /// Number of bytes (max 24)
        len: usize,
    },
    /// Write bytes to an I2C address behind the bridge
    I2cWrite {
        /// 7-bit address, e.g. 0x60
        #[arg(value_parser = parse_u8)]
        addr: u8,
        /// Data bytes, e.g. 0x01 0xc0
        #[arg(value_parser = parse_u8, required = true)]
        data: Vec<u8>,
    },
}

fn parse_u8(s: &str) -> std::result::Result<u8, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|_| format!("'{s}' is not a byte value"))
}

pub fn run(command: Command, json: bool) -> Result<()> {
    match command {
        Command::Devices => devices(json),
        Command::Identify => {
            let mut transport = UsbTransport::open()?;
            match identify(&mut transport)? {
                DeviceState::Cold => println!("cold (firmware download required)"),
                DeviceState::Warm => println!("warm (firmware resident)"),
            }
            Ok(())
        }
        Command::Flash { file } => flash(&file),
        Command::I2cRead { addr, len } => i2c_read(addr, len),
        Command::I2cWrite { addr, data } => i2c_write(addr, &data),
    }
}

fn devices(json: bool) -> Result<()> {
    let devices = transport::list_devices()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&devices)
                .map_err(|e| BridgeError::Io(format!("JSON output: {e}")))?
        );
        return Ok(());
    }
    if devices.is_empty() {
        println!("No LME2510C devices found.");
        return Ok(());
    }
    for d in devices {
        let serial = d.serial.as_deref().unwrap_or("(no serial)");
        println!(
            "{}  [{:04x}:{:04x}]  {serial}",
            d.path, d.vendor_id, d.product_id
        );
    }
    Ok(())
}

fn flash(file: &std::path::Path) -> Result<()> {
    let image = FirmwareImage::from_file(file)?;
    log::info!("firmware image: {} bytes", image.len());

    let mut transport = UsbTransport::open()?;
    if identify(&mut transport)? == DeviceState::Warm {
        return Err(BridgeError::Unsupported(
            "device is already warm; power-cycle it to flash again".into(),
        ));
    }

    let dev = Lme2510::new(transport);
    dev.download_firmware(&image)?;
    println!("Firmware uploaded; device is rebooting and will re-enumerate.");
    Ok(())
}

fn i2c_read(addr: u8, len: usize) -> Result<()> {
    let dev = warm_session()?;
    let mut buf = vec![0u8; len];
    let mut msgs = [I2cMessage::Read {
        addr,
        buf: &mut buf,
    }];
    dev.i2c_transfer(&mut msgs)?;
    println!("{buf:02x?}");
    Ok(())
}

fn i2c_write(addr: u8, data: &[u8]) -> Result<()> {
    let dev = warm_session()?;
    let mut msgs = [I2cMessage::Write { addr, data }];
    dev.i2c_transfer(&mut msgs)?;
    println!("ok");
    Ok(())
}

fn warm_session() -> Result<Lme2510<UsbTransport>> {
    let mut transport = UsbTransport::open()?;
    if identify(&mut transport)? == DeviceState::Cold {
        return Err(BridgeError::Unsupported(
            "device is cold; flash firmware first".into(),
        ));
    }
    Ok(Lme2510::new(transport))
}
