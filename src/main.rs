use anyhow::Context;
use env_logger::Env;
use log::info;
use umap_sweep::{
    backend::CpuBackend,
    chart::{plot_loss, BitmapPlotter, ChartConfig},
    config::OptimizationParams,
    dataset::load_iris,
    sweep::{print_summary, run_sweep},
};

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let iris = load_iris();
    info!(
        "loaded iris: {} samples x {} features, classes {:?}",
        iris.num_samples(),
        iris.num_features(),
        iris.target_names
    );

    let chart_config = ChartConfig::builder().caption("iris").path("figures").build();
    let output_dir = chart_config.path.clone();
    let mut plotter = BitmapPlotter::new(chart_config);

    let records = run_sweep::<CpuBackend, _>(&mut plotter, &iris, &OptimizationParams::default())?;

    for (i, record) in records.iter().enumerate() {
        let path = output_dir.join(format!("losses_{}.png", i + 1));
        plot_loss(&record.losses, &path)
            .with_context(|| format!("writing loss curve for {}", record.caption))?;
    }

    print_summary(&records);
    Ok(())
}
