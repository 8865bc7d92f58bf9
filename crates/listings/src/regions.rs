use std::path::PathBuf;

use listings_core::config::LocatorPreset;
use listings_core::dedup::dedup_regions;
use listings_core::regions::{crop, locate_regions};
use listings_core::types::Region;

use crate::artifacts::crop_file_name;
use crate::prelude::{println, *};
use crate::settings::{self, Preset};

#[derive(Debug, clap::Args)]
#[command(name = "regions")]
pub struct App {
    /// Page image (PNG or JPEG)
    image: PathBuf,

    /// Locator preset (overrides the config file)
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Write a crop of every region into this directory
    #[arg(long)]
    crops: Option<PathBuf>,

    /// Page number used to name the crops
    #[arg(long, default_value = "1")]
    page: usize,

    /// Output as JSON
    #[arg(long)]
    json: bool,
}

pub fn run(app: App, global: crate::Global) -> Result<()> {
    let mut config = settings::load(global.config.as_deref())?;
    if let Some(preset) = app.preset {
        config.locator.preset = preset.into();
    }

    let image = image::open(&app.image)
        .wrap_err_with(|| f!("Cannot open image {}", app.image.display()))?;
    let preset: &LocatorPreset = config.locator.active();
    let regions = dedup_regions(locate_regions(&image, preset), config.locator.overlap_ratio);
    log::debug!(
        "{}: {} regions with preset {:?}",
        app.image.display(),
        regions.len(),
        config.locator.preset
    );

    if let Some(dir) = &app.crops {
        std::fs::create_dir_all(dir)
            .wrap_err_with(|| f!("Cannot create directory {}", dir.display()))?;
        for (index, region) in regions.iter().enumerate() {
            let path = dir.join(crop_file_name(app.page, index + 1));
            crop(&image, region)
                .save(&path)
                .wrap_err_with(|| f!("Cannot write {}", path.display()))?;
        }
    }

    if app.json {
        println!("{}", serde_json::to_string_pretty(&regions)?);
        return Ok(());
    }

    print_regions(&regions);
    Ok(())
}

fn print_regions(regions: &[Region]) {
    if regions.is_empty() {
        println!("No code regions found");
        return;
    }

    let mut table = new_table();
    table.add_row(prettytable::row!["Rank", "Geometry", "Area"]);
    for (index, region) in regions.iter().enumerate() {
        table.add_row(prettytable::row![index + 1, region, region.area()]);
    }
    table.printstd();
}
