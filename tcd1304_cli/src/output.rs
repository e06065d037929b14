use clap::{ArgEnum, Args};
use simple_eyre::Result;
use std::io::Write;
use tcd1304::Spectrum;
use time::{format_description::FormatItem, macros::format_description};

#[derive(Args)]
pub struct Output {
    /// How spectra are printed to stdout
    #[clap(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(ArgEnum, Clone, Default)]
pub enum OutputFormat {
    /// Index, capture time and a few pixels from both ends
    #[default]
    Summary,
    /// Index followed by every pixel, tab separated
    Tsv,
}

const TIMESTAMP_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour]:[minute]:[second].[subsecond digits:3]");

fn spectrum_to_summary(spectrum: &Spectrum) -> Result<String> {
    log::trace!("Formatting spectrum #{} as summary", spectrum.sample_index);
    Ok(format!(
        "{}\t{}",
        spectrum.captured_at.format(TIMESTAMP_FORMAT)?,
        spectrum.summary()
    ))
}

impl Output {
    pub fn write_spectrum(&self, out: &mut impl Write, spectrum: &Spectrum) -> Result<()> {
        match self.format {
            OutputFormat::Summary => writeln!(out, "{}", spectrum_to_summary(spectrum)?)?,
            OutputFormat::Tsv => {
                log::trace!("Formatting spectrum #{} as TSV", spectrum.sample_index);
                out.write_all(spectrum.to_text_line().as_bytes())?
            }
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn spectrum() -> Spectrum {
        Spectrum {
            sample_index: 3,
            pixels: (0..3648).map(|px| (px % 4096) as u16).collect(),
            captured_at: datetime!(2023-05-01 12:30:15.250 UTC),
        }
    }

    #[test]
    fn summary_line() {
        let mut out = Vec::new();
        Output {
            format: OutputFormat::Summary,
        }
        .write_spectrum(&mut out, &spectrum())
        .unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "12:30:15.250\t3\t0\t1\t2\t...\t3646\t3647\n"
        );
    }

    #[test]
    fn tsv_line() {
        let mut out = Vec::new();
        Output {
            format: OutputFormat::Tsv,
        }
        .write_spectrum(&mut out, &spectrum())
        .unwrap();
        let line = String::from_utf8(out).unwrap();
        let fields: Vec<_> = line.trim_end().split('\t').collect();
        assert_eq!(fields.len(), 3649);
        assert_eq!(fields[0], "3");
        assert_eq!(fields[3648], "3647");
    }
}
