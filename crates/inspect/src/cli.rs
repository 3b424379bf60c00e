use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Query tiles against a persisted availability subtree.
    Availability(AvailabilityCli),
    /// List the raster tiles draped over a geometry rectangle.
    Map(MapCli),
}

#[derive(Args, Debug)]
pub struct AvailabilityCli {
    /// Root subtree, tile bits then content bits then child subtree bits.
    pub subtree_path: PathBuf,
    /// `level/x/y`, or `level/x/y/z` for octrees.
    #[arg(required = true)]
    pub tiles: Vec<String>,

    #[arg(short, long, default_value_t = 5)]
    pub subtree_levels: u32,
    #[arg(short, long, default_value_t = 20)]
    pub maximum_level: u32,
    #[arg(long, default_value_t = false)]
    pub octree: bool,

    /// Every tile has this availability, the section is left out of the file.
    #[arg(long)]
    pub tile_constant: Option<bool>,
    #[arg(long)]
    pub content_constant: Option<bool>,
    #[arg(long)]
    pub subtree_constant: Option<bool>,
}

#[derive(Args, Debug)]
pub struct MapCli {
    /// RON tiles configuration. Tile URLs resolve relative to its directory.
    pub config_path: PathBuf,
    /// West, south, east and north edges in degrees.
    #[arg(num_args = 4, value_names = ["WEST", "SOUTH", "EAST", "NORTH"], allow_negative_numbers = true)]
    pub rectangle: Vec<f64>,

    #[arg(short, long, default_value_t = 1000.0)]
    pub geometric_error: f64,
    /// Name of the overlay to map, the first one if absent.
    #[arg(short, long)]
    pub overlay: Option<String>,
    /// Wait for the raster tiles and report how they loaded.
    #[arg(short, long, default_value_t = false)]
    pub load: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_availability_queries() {
        let cli = Cli::try_parse_from([
            "tessera_inspect",
            "availability",
            "root.subtree",
            "0/0/0",
            "2/1/3",
            "--subtree-levels",
            "3",
            "--tile-constant",
            "true",
        ])
        .unwrap();

        let Command::Availability(args) = cli.command else {
            panic!("expected the availability command");
        };
        assert_eq!(args.tiles, ["0/0/0", "2/1/3"]);
        assert_eq!(args.subtree_levels, 3);
        assert_eq!(args.maximum_level, 20);
        assert_eq!(args.tile_constant, Some(true));
        assert_eq!(args.content_constant, None);
        assert!(!args.octree);
    }

    #[test]
    fn parses_negative_rectangles() {
        let cli = Cli::try_parse_from(["tessera_inspect", "map", "tiles.ron", "-10", "-5", "10", "5", "--load"]).unwrap();

        let Command::Map(args) = cli.command else {
            panic!("expected the map command");
        };
        assert_eq!(args.rectangle, [-10.0, -5.0, 10.0, 5.0]);
        assert!(args.load);
        assert_eq!(args.overlay, None);
    }
}
