use std::{env, path::PathBuf};

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub mode: CliMode,
    pub sample: bool,
    pub config_path: Option<PathBuf>,
    pub practitioner_email: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CliMode {
    Interactive,
    /// `None` means today in the practitioner's time zone.
    AgendaDate(Option<NaiveDate>),
    Help,
}

pub const USAGE: &str = "Usage: ollie [--agenda [YYYY-MM-DD]] [--sample] [--config <path>] [--as <email>]";

pub fn parse_cli_mode() -> Result<CliOptions, String> {
    parse_args(env::args().skip(1))
}

pub fn parse_args<I: Iterator<Item = String>>(args: I) -> Result<CliOptions, String> {
    let mut options = CliOptions {
        mode: CliMode::Interactive,
        sample: false,
        config_path: None,
        practitioner_email: None,
    };
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--sample" => {
                options.sample = true;
            }
            "--agenda" => {
                let target_date = args
                    .next_if(|next| !next.starts_with("--"))
                    .map(|date_str| {
                        NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                            .map_err(|_| format!("Invalid date '{}'. Use YYYY-MM-DD.", date_str))
                    })
                    .transpose()?;
                options.mode = CliMode::AgendaDate(target_date);
            }
            "--config" => {
                let path = args.next().ok_or("--config requires a path")?;
                options.config_path = Some(PathBuf::from(path));
            }
            "--as" => {
                let email = args.next().ok_or("--as requires an email")?;
                options.practitioner_email = Some(email);
            }
            "--help" => {
                options.mode = CliMode::Help;
            }
            _ => return Err(format!("Unknown argument: {}", arg)),
        }
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions, String> {
        parse_args(args.iter().map(|a| a.to_string()))
    }

    #[test]
    fn no_arguments_is_interactive() {
        let options = parse(&[]).unwrap();
        assert_eq!(options.mode, CliMode::Interactive);
        assert!(!options.sample);
    }

    #[test]
    fn agenda_with_date() {
        let options = parse(&["--agenda", "2025-01-06", "--sample"]).unwrap();
        assert_eq!(options.mode, CliMode::AgendaDate(Some(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap())));
        assert!(options.sample);
    }

    #[test]
    fn agenda_without_date_leaves_day_to_caller() {
        let options = parse(&["--agenda", "--sample"]).unwrap();
        assert_eq!(options.mode, CliMode::AgendaDate(None));
        assert!(options.sample);
    }

    #[test]
    fn agenda_with_bad_date_fails() {
        assert!(parse(&["--agenda", "06/01/2025"]).is_err());
    }

    #[test]
    fn config_requires_path() {
        assert!(parse(&["--config"]).is_err());
        let options = parse(&["--config", "/tmp/ollie.toml"]).unwrap();
        assert_eq!(options.config_path, Some(PathBuf::from("/tmp/ollie.toml")));
    }

    #[test]
    fn unknown_argument_fails() {
        assert_eq!(parse(&["--frobnicate"]), Err("Unknown argument: --frobnicate".to_string()));
    }
}
