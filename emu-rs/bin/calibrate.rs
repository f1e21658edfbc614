use std::{env, process};

use emu::{config::CalibConfig, mcmc::Posterior, outputs::Channel, prelude::*, utils::render_vbars};
use simple_logger::SimpleLogger;

const PLOT_HEIGHT: usize = 15;

pub fn main() {
    SimpleLogger::new().init().unwrap();

    let path = env::args().nth(1).unwrap_or_else(|| "calib.toml".to_string());
    if let Err(e) = run(&path) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(path: &str) -> Result<()> {
    let cfg = CalibConfig::from_path(path)?;
    let calib = cfg.load()?;
    println!("{}\n", calib.description());

    let posterior = cfg.sampler.run(&calib)?;
    print_summary(&posterior, &calib)?;

    let mut draws = posterior.draws();
    if let Some(n) = cfg.n_simulated {
        let stride = (draws.len() / n.max(1)).max(1);
        draws = draws.into_iter().step_by(stride).take(n).collect();
    }
    let summary = simulate_draws(&calib, &draws)?.quantiles(&cfg.quantiles)?;
    summary.to_path(&cfg.output)?;
    println!("Quantiles written to {}", cfg.output);

    if let Ok(median) = summary.band(Channel::Incidence, 0.5) {
        println!("\nMedian incidence:");
        println!("{}", render_vbars(&median.to_vec(), PLOT_HEIGHT));
    }
    Ok(())
}

fn print_summary(posterior: &Posterior, calib: &StandardCalib<SimpleRenewal>) -> Result<()> {
    for (i, chain) in posterior.chains().iter().enumerate() {
        println!("chain {}: acceptance {:.3}", i, chain.acceptance());
    }
    let mut names: Vec<&str> = calib.priors().keys().map(|k| k.as_str()).collect();
    names.extend(&["proc_dispersion", "dispersion"]);
    println!(
        "{:>16} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "param", "prior mean", "mean", "sd", "min", "max"
    );
    for name in names {
        let st = posterior.summary(name)?;
        let prior_mean = match calib.priors().get(name) {
            Some(prior) => format!("{:.4}", prior.mean()),
            None => "-".to_string(),
        };
        println!(
            "{:>16} {:>10} {:>10.4} {:>10.4} {:>10.4} {:>10.4}",
            name,
            prior_mean,
            st.mean(),
            st.std(),
            st.min(),
            st.max()
        );
    }
    Ok(())
}
