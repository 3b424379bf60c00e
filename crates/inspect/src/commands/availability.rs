use crate::cli::AvailabilityCli;
use bevy_log::{info, warn};
use std::{fs, str::FromStr};
use tessera_geometry::{
    OctreeTileId, ParseTileIdError, QuadtreeTileId,
    availability::{AvailabilitySubtree, AvailabilityTree, ImplicitTileId, SubtreeLayout, TileAvailabilityFlags},
};
use tessera_tiles::TilesResult;

/// Grafts the root subtree and answers every queried tile, in order.
pub fn query(args: &AvailabilityCli) -> TilesResult<Vec<(String, TileAvailabilityFlags)>> {
    if args.octree {
        query_tree::<OctreeTileId>(args)
    } else {
        query_tree::<QuadtreeTileId>(args)
    }
}

fn query_tree<T>(args: &AvailabilityCli) -> TilesResult<Vec<(String, TileAvailabilityFlags)>>
where
    T: ImplicitTileId + FromStr<Err = ParseTileIdError> + Default,
{
    let layout = SubtreeLayout {
        tile_constant: args.tile_constant,
        content_constant: args.content_constant,
        subtree_constant: args.subtree_constant,
    };
    let bytes = fs::read(&args.subtree_path)?;
    let subtree = AvailabilitySubtree::from_bytes(bytes, T::SUBDIVISION, args.subtree_levels, layout)?;

    let mut tree = AvailabilityTree::<T>::new(args.subtree_levels, args.maximum_level);
    if !tree.add_subtree(T::default(), subtree) {
        warn!(
            "Root subtree was rejected, {} levels per subtree up to level {}",
            args.subtree_levels,
            args.maximum_level
        );
    }

    args.tiles
        .iter()
        .map(|tile| {
            let tile_id = tile.parse::<T>()?;
            let flags = tree.compute_availability(tile_id);
            info!("{tile_id}: {flags:?}");
            Ok((tile_id.to_string(), flags))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;
    use std::{env, path::PathBuf, process};

    fn write_subtree(name: &str, bytes: &[u8]) -> PathBuf {
        let path = env::temp_dir().join(format!("tessera_inspect_{name}_{}.subtree", process::id()));
        fs::write(&path, bytes).unwrap();
        path
    }

    fn parse(arguments: &[&str]) -> AvailabilityCli {
        let Command::Availability(args) = Cli::try_parse_from(arguments).unwrap().command else {
            panic!("expected the availability command");
        };
        args
    }

    #[test]
    fn answers_queries_from_a_persisted_subtree() {
        // Two levels: the root and its south west child have tiles, only the
        // root has content, no child subtrees.
        let path = write_subtree("quadtree", &[0b0000_0011, 0b0000_0001]);
        let args = parse(&[
            "tessera_inspect",
            "availability",
            path.to_str().unwrap(),
            "0/0/0",
            "1/0/0",
            "1/1/1",
            "--subtree-levels",
            "2",
            "--maximum-level",
            "4",
            "--subtree-constant",
            "false",
        ]);

        let answers = query(&args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(answers[0].0, "0/0/0");
        assert!(answers[0].1.contains(TileAvailabilityFlags::TILE_AVAILABLE | TileAvailabilityFlags::CONTENT_AVAILABLE));
        assert!(answers[1].1.contains(TileAvailabilityFlags::TILE_AVAILABLE));
        assert!(!answers[1].1.contains(TileAvailabilityFlags::CONTENT_AVAILABLE));
        assert!(!answers[2].1.contains(TileAvailabilityFlags::TILE_AVAILABLE));
    }

    #[test]
    fn constant_octree_subtrees_need_no_data() {
        let path = write_subtree("octree", &[]);
        let args = parse(&[
            "tessera_inspect",
            "availability",
            path.to_str().unwrap(),
            "1/1/0/1",
            "--octree",
            "--subtree-levels",
            "2",
            "--tile-constant",
            "true",
            "--content-constant",
            "false",
            "--subtree-constant",
            "false",
        ]);

        let answers = query(&args).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(answers.len(), 1);
        assert!(answers[0].1.contains(TileAvailabilityFlags::TILE_AVAILABLE));
        assert!(!answers[0].1.contains(TileAvailabilityFlags::CONTENT_AVAILABLE));
    }

    #[test]
    fn malformed_tile_ids_are_reported() {
        let path = write_subtree("malformed", &[]);
        let args = parse(&[
            "tessera_inspect",
            "availability",
            path.to_str().unwrap(),
            "1/0",
            "--tile-constant",
            "true",
            "--content-constant",
            "true",
            "--subtree-constant",
            "false",
        ]);

        let result = query(&args);
        fs::remove_file(&path).unwrap();

        assert!(matches!(result, Err(tessera_tiles::TilesError::TileId(_))));
    }
}
