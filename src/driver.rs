use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};

use anyhow::Context;
use log::info;

use crate::cli::Args;
use crate::loader::Loader;

pub fn run(args: &Args, loader: &Loader) -> anyhow::Result<()> {
    let mut rng = loader.rng();

    let mut output: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    };

    let program = match args.input.as_deref().filter(|_| !args.reads_stdin()) {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
            loader.relocate(BufReader::new(file), &mut output, &mut rng)
        }
        None => loader.relocate(io::stdin().lock(), &mut output, &mut rng),
    };
    // the header echo may already be out; keep it visible on failure
    output.flush()?;
    let program = program?;

    info!(
        "relocated {:?} to {:#08x}, transfer address {:#08x}",
        program.header.name,
        program.load_address(),
        program.transfer_address
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::run;
    use crate::cli::Args;
    use crate::loader::Loader;
    use clap::Parser;
    use std::ffi::OsStr;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn scratch_dir() -> std::path::PathBuf {
        let uniq = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("time")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("sicld-driver-test-{uniq}"));
        fs::create_dir_all(&dir).expect("mkdir");
        dir
    }

    #[test]
    fn relocates_file_to_file() {
        let dir = scratch_dir();
        let input = dir.join("prog.obj");
        let output = dir.join("prog.out");
        fs::write(&input, "HPROG  000000000003\nT00124003AABBCC\nE\n").expect("write input");

        let args = Args::parse_from([
            OsStr::new("sicld"),
            input.as_os_str(),
            OsStr::new("-o"),
            output.as_os_str(),
            OsStr::new("--load-address"),
            OsStr::new("0x1240"),
        ]);
        let loader = Loader::new(&args.build_config().expect("config")).expect("valid");
        run(&args, &loader).expect("run");

        let text = fs::read_to_string(&output).expect("read output");
        assert_eq!(text, "IPROG  001240000003001240\nAABBCC\n");

        let _ = fs::remove_file(input);
        let _ = fs::remove_file(output);
        let _ = fs::remove_dir(dir);
    }

    #[test]
    fn reports_missing_input_file() {
        let dir = scratch_dir();
        let missing = dir.join("none.obj");
        let args = Args::parse_from([OsStr::new("sicld"), missing.as_os_str()]);
        let loader = Loader::new(&args.build_config().expect("config")).expect("valid");
        let err = run(&args, &loader).expect_err("must fail");
        assert!(err.to_string().contains("failed to open"));
        let _ = fs::remove_dir(dir);
    }
}
