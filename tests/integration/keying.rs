//! Key derivation: enumeration and lookup must agree

use assetforge::catalog::Catalog;
use assetforge::key::{asset_key, canonicalize, WorkItem};
use proptest::prelude::*;

#[test]
fn test_enumeration_and_lookup_agree() {
    let catalog = Catalog::from_json(
        r#"{"makes":[
            {"name":"Maruti Suzuki","models":[{"name":"Grand Vitara"},{"name":"Alto K10","discontinued":true}]},
            {"name":"Honda","models":[{"name":"WR-V"}]}
        ]}"#,
    )
    .unwrap();
    let index = catalog.key_index();

    for item in catalog.work_items() {
        let file_name = format!("{}.png", item.key());
        assert_eq!(index.lookup_file_name(&file_name), Some(&item));
    }
    assert_eq!(
        index.lookup("maruti_suzuki_alto_k10"),
        Some(&WorkItem::new("Maruti Suzuki", "Alto K10"))
    );
}

proptest! {
    #[test]
    fn prop_key_is_stable_and_canonical(category in "[A-Za-z -]{1,12}", item in "[A-Za-z0-9 -]{1,12}") {
        let work = WorkItem::new(category.clone(), item.clone());
        prop_assert_eq!(work.key(), asset_key(&category, &item));
        prop_assert_eq!(work.key(), work.clone().key());

        // Canonicalizing twice changes nothing.
        let once = canonicalize(&item);
        prop_assert_eq!(canonicalize(&once), once.clone());
        prop_assert!(!once.contains(' ') && !once.contains('-'));
    }

    #[test]
    fn prop_surrounding_whitespace_and_case_do_not_matter(item in "[a-z0-9]{1,10}") {
        let padded = format!("  {} ", item.to_uppercase());
        prop_assert_eq!(asset_key("Kia", &padded), asset_key("kia", &item));
    }
}
