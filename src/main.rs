use clap::Parser;
use log::{error, info};
use std::process::ExitCode;

use labelme2yolopose::{process_dataset, run_merge, run_split, Args, Command};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let result = match &args.command {
        Command::Split(split_args) => {
            info!("Splitting LabelMe files into train/val...");
            run_split(split_args).map(|_| ())
        }
        Command::Convert(convert_args) => {
            info!("Starting the YOLO-pose conversion process...");
            process_dataset(convert_args).map(|_| ())
        }
        Command::Merge(merge_args) => {
            info!("Merging labelled data into the train split...");
            run_merge(merge_args).map(|_| ())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
