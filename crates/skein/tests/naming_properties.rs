// Naming Properties — reproducible and collision-free module paths

use std::collections::HashSet;

use proptest::prelude::*;
use skein::prelude::*;

fn build(names: &[String], children: &[usize]) -> Vec<Path> {
    let mut paths = Vec::new();
    for (name, &n) in names.iter().zip(children) {
        let module = Module::new(name).unwrap();
        for _ in 0..n {
            paths.push(module.child(name).unwrap().path().clone());
        }
        paths.push(module.path().clone());
    }
    paths
}

proptest! {
    #[test]
    fn paths_are_reproducible_after_reset(
        names in prop::collection::vec("[A-Z][a-z]{0,3}[0-9]?", 1..12),
        children in prop::collection::vec(0usize..3, 12),
    ) {
        reset();
        let first = build(&names, &children);
        reset();
        let second = build(&names, &children);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn paths_never_collide(
        names in prop::collection::vec("[A-Z][a-z]{0,2}[0-9]?", 1..16),
        children in prop::collection::vec(0usize..3, 16),
    ) {
        reset();
        let paths = build(&names, &children);
        let unique: HashSet<&Path> = paths.iter().collect();
        prop_assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn rendered_paths_parse_back(
        names in prop::collection::vec("[A-Za-z_][A-Za-z0-9_]{0,5}", 1..6),
    ) {
        reset();
        let children = vec![1; names.len()];
        for path in build(&names, &children) {
            let parsed: Path = path.to_string().parse().unwrap();
            prop_assert_eq!(parsed, path);
        }
    }
}

#[test]
fn test_explicit_name_is_skipped_by_generated_ones() {
    reset();
    let explicit = Module::new("Dense2").unwrap();
    let first = Module::new("Dense").unwrap();
    let second = Module::new("Dense").unwrap();
    assert_eq!(explicit.path().to_string(), "/Dense2");
    assert_eq!(first.path().to_string(), "/Dense");
    assert_eq!(second.path().to_string(), "/Dense3");
}
