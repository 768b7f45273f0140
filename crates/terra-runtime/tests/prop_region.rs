use proptest::prelude::*;
use terra_runtime::Region;
use terra_world::ChunkCoord;

fn coord() -> impl Strategy<Value = ChunkCoord> {
    (-1000i32..1000, -1000i32..1000, -1000i32..1000).prop_map(ChunkCoord::from)
}

proptest! {
    // A centered region holds exactly side^3 coordinates around its center
    #[test]
    fn centered_region_shape(center in coord(), side in 1i32..20) {
        let r = Region::centered(center, side);
        prop_assert_eq!(r.center(), center);
        prop_assert!(r.contains(center));
        prop_assert_eq!(r.len(), (side * side * side) as usize);
        prop_assert!(r.contains(r.min));
        prop_assert!(!r.contains(r.max()));
        prop_assert_eq!(r.max().cx - r.min.cx, side);
    }

    // index_of and coord_at are inverse over the region
    #[test]
    fn index_of_inverts_coord_at(center in coord(), side in 1i32..8, pick in any::<prop::sample::Index>()) {
        let r = Region::centered(center, side);
        let i = pick.index(r.len());
        let c = r.coord_at(i);
        prop_assert!(r.contains(c));
        prop_assert_eq!(r.index_of(c), Some(i));
    }
}
