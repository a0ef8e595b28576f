//! Programmer registration and dispatch
//!
//! Every backend that can carry SPI2AHB traffic is listed here, gated by
//! its cargo feature, and opened into a boxed [`Transport`].

use std::collections::HashMap;

use spi2ahb_core::Transport;

/// Information about a programmer
pub struct ProgrammerInfo {
    /// Primary name (used for matching)
    pub name: &'static str,
    /// Alternative names/aliases
    pub aliases: &'static [&'static str],
    /// Short description
    pub description: &'static str,
}

/// Get information about all available programmers (enabled at compile time)
#[allow(unused_mut, clippy::vec_init_then_push)]
pub fn available_programmers() -> Vec<ProgrammerInfo> {
    let mut programmers = Vec::new();

    #[cfg(feature = "ft4222")]
    programmers.push(ProgrammerInfo {
        name: "ft4222",
        aliases: &["ft4222h"],
        description: "FT4222H USB SPI bridge (index=<n>,div=<n>,spispeed=<kHz>,cs=<0-3>,iomode=<single|dual|quad>)",
    });

    #[cfg(feature = "dummy")]
    programmers.push(ProgrammerInfo {
        name: "dummy",
        aliases: &[],
        description: "Emulated SPI2AHB peripheral in memory (base=<addr>,busy=<polls>)",
    });

    programmers
}

/// Generate a short list of programmer names for CLI help
pub fn programmer_names_short() -> String {
    let programmers = available_programmers();
    let names: Vec<&str> = programmers.iter().map(|p| p.name).collect();
    names.join(", ")
}

/// Print all programmers, and attached hardware where it can be enumerated
pub fn list_programmers() {
    let programmers = available_programmers();
    if programmers.is_empty() {
        println!("No programmers available (recompile with programmer features enabled)");
        return;
    }

    println!("Available programmers:");
    for p in &programmers {
        let aliases = if p.aliases.is_empty() {
            String::new()
        } else {
            format!(" (aliases: {})", p.aliases.join(", "))
        };
        println!("  {:8} - {}{}", p.name, p.description, aliases);
    }

    #[cfg(feature = "ft4222")]
    list_ft4222_devices();
}

#[cfg(feature = "ft4222")]
fn list_ft4222_devices() {
    match spi2ahb_ft4222::Ft4222::list_devices() {
        Ok(devices) if devices.is_empty() => println!("\nNo FT4222H devices attached"),
        Ok(devices) => {
            println!("\nAttached FT4222H devices:");
            for d in devices {
                println!("  {}", d);
            }
        }
        Err(e) => log::warn!("Could not enumerate FT4222H devices: {}", e),
    }
}

/// Parsed programmer parameters
#[derive(Debug)]
pub struct ProgrammerParams {
    /// Programmer name as given
    pub name: String,
    /// Key-value parameters
    pub params: HashMap<String, String>,
}

impl ProgrammerParams {
    /// Parameters as borrowed pairs, sorted by key
    fn options(&self) -> Vec<(&str, &str)> {
        let mut options: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        options.sort_unstable();
        options
    }
}

/// Parse a programmer string into name and parameters
///
/// Format: "name" or "name:key1=value1,key2=value2"
pub fn parse_programmer_params(s: &str) -> Result<ProgrammerParams, Box<dyn std::error::Error>> {
    let (name, opts_str) = s.split_once(':').unwrap_or((s, ""));

    let mut params = HashMap::new();
    if !opts_str.is_empty() {
        for opt in opts_str.split(',') {
            if let Some((key, value)) = opt.split_once('=') {
                params.insert(key.to_string(), value.to_string());
            } else {
                return Err(
                    format!("Invalid parameter format: '{}' (expected key=value)", opt).into(),
                );
            }
        }
    }

    Ok(ProgrammerParams {
        name: name.to_string(),
        params,
    })
}

/// Open a programmer and return it as a transport
///
/// `div` overrides the `div` option of backends that have a clock divider.
pub fn open_programmer(
    programmer: &str,
    div: Option<u32>,
) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let mut params = parse_programmer_params(programmer)?;
    if let Some(div) = div {
        params.params.insert("div".to_string(), div.to_string());
    }

    match params.name.as_str() {
        #[cfg(feature = "ft4222")]
        "ft4222" | "ft4222h" => open_ft4222(&params),
        #[cfg(feature = "dummy")]
        "dummy" => open_dummy(&params),
        name => Err(format!(
            "Unknown programmer: {} (available: {})",
            name,
            programmer_names_short()
        )
        .into()),
    }
}

#[cfg(feature = "ft4222")]
fn open_ft4222(params: &ProgrammerParams) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let config = spi2ahb_ft4222::parse_options(&params.options())?;
    let device = spi2ahb_ft4222::Ft4222::open_with_config(config)?;
    log::info!("SPI clock: {} kHz", device.actual_speed_khz());
    Ok(Box::new(device))
}

#[cfg(feature = "dummy")]
fn open_dummy(params: &ProgrammerParams) -> Result<Box<dyn Transport>, Box<dyn std::error::Error>> {
    let mut config = spi2ahb_dummy::DummyConfig::default();

    for (key, value) in params.options() {
        match key {
            "base" => {
                let hex = value.trim_start_matches("0x").trim_start_matches("0X");
                config.initial_base = u32::from_str_radix(hex, 16)
                    .map_err(|_| format!("Invalid base value: {}", value))?;
            }
            "busy" => {
                config.busy_polls = value
                    .parse()
                    .map_err(|_| format!("Invalid busy value: {}", value))?;
            }
            // The emulator has no clock
            "div" => {}
            _ => log::warn!("Unknown dummy option: {}={}", key, value),
        }
    }

    log::info!("Using emulated SPI2AHB peripheral");
    Ok(Box::new(spi2ahb_dummy::DummyBridge::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_programmer_params() {
        let p = parse_programmer_params("ft4222:index=1,div=8").unwrap();
        assert_eq!(p.name, "ft4222");
        assert_eq!(p.params.get("index").map(String::as_str), Some("1"));
        assert_eq!(p.options(), vec![("div", "8"), ("index", "1")]);

        let p = parse_programmer_params("dummy").unwrap();
        assert_eq!(p.name, "dummy");
        assert!(p.params.is_empty());

        assert!(parse_programmer_params("ft4222:index").is_err());
    }

    #[test]
    fn test_unknown_programmer() {
        assert!(open_programmer("nonexistent", None).is_err());
    }

    #[cfg(feature = "dummy")]
    #[test]
    fn test_open_dummy_with_options() {
        let mut t = open_programmer("dummy:base=0x04000000,busy=2", Some(4)).unwrap();
        // Status of an idle device is ready
        assert_eq!(t.exchange(&[0x40], 1).unwrap(), vec![0x80]);
        assert!(open_programmer("dummy:busy=many", None).is_err());
    }
}
