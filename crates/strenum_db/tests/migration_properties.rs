use proptest::prelude::*;
use strenum_db::{
    CodeMapping, ColumnConversion, ColumnDef, DbValue, EnumMigrator, MemoryCatalog, TableName,
    TypeName,
};

fn labels_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::btree_set("[a-z]{1,8}", 2..10).prop_map(|set| set.into_iter().collect())
}

fn kind() -> TypeName {
    TypeName::public("kind")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn test_add_then_reorder_moves_only_the_new_label(labels in labels_strategy()) {
        let mut migrator = EnumMigrator::new(MemoryCatalog::new());
        migrator.create_enum(&kind(), labels.clone()).unwrap();

        let added = "zz_new".to_string();
        prop_assert!(migrator.add_value(&kind(), &added, None).unwrap());
        migrator.reorder_values(&kind(), &[added.clone()]).unwrap();

        let after = migrator.executor().enum_labels(&kind()).unwrap();
        let mut expected = vec![added];
        expected.extend(labels);
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn test_reorder_puts_request_first_and_keeps_the_rest_stable(
        labels in labels_strategy(),
        picks in prop::collection::vec(any::<prop::sample::Index>(), 0..4),
    ) {
        let mut requested: Vec<String> = Vec::new();
        for pick in &picks {
            let label = pick.get(&labels).clone();
            if !requested.contains(&label) {
                requested.push(label);
            }
        }

        let mut migrator = EnumMigrator::new(MemoryCatalog::new());
        migrator.create_enum(&kind(), labels.clone()).unwrap();
        migrator.reorder_values(&kind(), &requested).unwrap();
        // applying the same order twice is stable
        migrator.reorder_values(&kind(), &requested).unwrap();

        let after = migrator.executor().enum_labels(&kind()).unwrap();
        let mut expected = requested.clone();
        expected.extend(labels.iter().filter(|l| !requested.contains(l)).cloned());
        prop_assert_eq!(after, expected);
    }

    #[test]
    fn test_int_codes_convert_to_mapped_labels(codes in prop::collection::vec(0i64..2, 0..20)) {
        let users = TableName::new("users");
        let mut catalog = MemoryCatalog::new();
        catalog.create_table(&users, vec![ColumnDef::integer("partner_type")]).unwrap();
        for code in &codes {
            catalog.insert(&users, &[("partner_type", DbValue::from(*code))]).unwrap();
        }

        let partner = TypeName::public("user_partner_type_enum");
        let conversion = ColumnConversion::integer_codes(
            users.clone(),
            "partner_type",
            partner.clone(),
            vec![CodeMapping::new("retail", 0), CodeMapping::new("affiliate", 1)],
        );
        EnumMigrator::new(&mut catalog).convert_column(&conversion).unwrap();

        let expected: Vec<DbValue> = codes
            .iter()
            .map(|code| DbValue::from(if *code == 0 { "retail" } else { "affiliate" }))
            .collect();
        prop_assert_eq!(catalog.column_values(&users, "partner_type").unwrap(), expected);
        prop_assert_eq!(
            catalog.column_type(&users, "partner_type"),
            Some("public.user_partner_type_enum".to_string())
        );
    }

    #[test]
    fn test_delete_of_stored_label_changes_nothing(
        labels in labels_strategy(),
        stored in any::<prop::sample::Index>(),
    ) {
        let stored = stored.get(&labels).clone();
        let items = TableName::new("items");
        let mut catalog = MemoryCatalog::new();
        EnumMigrator::new(&mut catalog).create_enum(&kind(), labels.clone()).unwrap();
        catalog.create_table(&items, vec![ColumnDef::enumerated("kind", kind())]).unwrap();
        catalog.insert(&items, &[("kind", DbValue::from(stored.as_str()))]).unwrap();
        catalog.clear_log();

        let result = EnumMigrator::new(&mut catalog).delete_value(&kind(), &stored);

        prop_assert!(result.unwrap_err().is_precondition());
        prop_assert_eq!(catalog.enum_labels(&kind()).unwrap(), labels);
        prop_assert!(!catalog.has_type(&kind().shadow()));
        prop_assert!(catalog.executed().is_empty());
    }

    #[test]
    fn test_delete_of_unused_label_keeps_order_and_rows(
        labels in labels_strategy(),
        target in any::<prop::sample::Index>(),
    ) {
        let target_idx = target.index(labels.len());
        let target = labels[target_idx].clone();
        let kept = labels[(target_idx + 1) % labels.len()].clone();

        let items = TableName::new("items");
        let mut catalog = MemoryCatalog::new();
        EnumMigrator::new(&mut catalog).create_enum(&kind(), labels.clone()).unwrap();
        catalog.create_table(&items, vec![ColumnDef::enumerated("kind", kind())]).unwrap();
        catalog.insert(&items, &[("kind", DbValue::from(kept.as_str()))]).unwrap();
        catalog.clear_log();

        EnumMigrator::new(&mut catalog).delete_value(&kind(), &target).unwrap();

        let expected: Vec<String> = labels.iter().filter(|l| **l != target).cloned().collect();
        prop_assert_eq!(catalog.enum_labels(&kind()).unwrap(), expected);
        prop_assert_eq!(
            catalog.column_values(&items, "kind").unwrap(),
            vec![DbValue::from(kept.as_str())]
        );
        prop_assert_eq!(catalog.executed().len(), 4);
    }
}
