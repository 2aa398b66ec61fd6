use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use lib_features::evaluation::evaluate_all;
use lib_features::pipeline::run_tracking;
use lib_features::{FeaturesError, RunMode, TrackingConfig};
use log::{debug, error, info};

fn load_config() -> Result<TrackingConfig, FeaturesError> {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => {
            info!("Конфигурация: {}", path.display());
            TrackingConfig::load(&path)
        }
        None => {
            info!("Файл конфигурации не указан, используются значения по умолчанию");
            Ok(TrackingConfig::default())
        }
    }
}

fn run(config: &TrackingConfig) -> Result<(), FeaturesError> {
    match config.mode {
        RunMode::Track => {
            let reports = run_tracking(config)?;
            let total_matches: usize = reports.iter().filter_map(|r| r.matches).sum();
            info!(
                "Обработано {} кадров, всего {} совпадений",
                reports.len(),
                total_matches
            );
        }
        RunMode::Evaluate => {
            let report = evaluate_all(config)?;
            report.save_json(&config.report_path)?;
            if let Some(best) = report.best_by_matches() {
                info!(
                    "Больше всего совпадений у {} + {}: {}",
                    best.detector, best.descriptor, best.total_matches
                );
            }
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("Не удалось загрузить конфигурацию: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("{:?}", config);

    let start_time = Instant::now();
    if let Err(e) = run(&config) {
        error!("Ошибка при обработке последовательности: {}", e);
        return ExitCode::FAILURE;
    }
    info!("Готово за {:?}", start_time.elapsed());
    ExitCode::SUCCESS
}
