use anyhow::Result;
use nowcast_core::{AppError, Config};
use nowcast_weather::{RenderState, WeatherWidget};

#[tokio::main]
async fn main() -> Result<()> {
    nowcast_core::init()?;

    let (config, _warnings) = Config::load_validated().inspect_err(banner)?;
    tracing::debug!("Config directory: {}", config.config_dir.display());

    let widget = WeatherWidget::from_config(&config).inspect_err(banner)?;
    render(&widget.render().await);

    Ok(())
}

fn render(state: &RenderState) {
    match state {
        RenderState::Ready(model) => {
            println!("📍{}", model.place_label);
            println!("{}  {}", model.temperature, model.description);
            println!("Humidity: {}", model.humidity);
            println!("Wind: {}", model.wind);
            println!("Icon: {}", model.icon.asset_path());
        }
        RenderState::NoConditions => {
            println!("No current conditions available.");
        }
        RenderState::Failed { message } => {
            eprintln!("⚠ {}", message);
        }
    }
}

fn banner(error: &AppError) {
    eprintln!("⚠ {}", error.user_message());
}
