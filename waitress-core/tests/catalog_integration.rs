use rust_xlsxwriter::Workbook;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use waitress_core::catalog::{diff, join_all, publishable, CatalogError};
use waitress_core::categories::{load_categories, CategoryRecord};
use waitress_core::descriptor::{parse_folder, RaType};

const GET_BATTERY: &str = r#"{
    "name": "Get-Battery",
    "description": "Reports battery health and charge cycles",
    "purpose": "Troubleshooting",
    "scriptInfo": { "scriptWindows": "Get-Battery.ps1", "scriptMacOs": null }
}"#;

const GET_UPTIME: &str = r#"{
    "name": "Get-Uptime",
    "description": "Time since last boot",
    "scriptInfo": { "scriptWindows": "Get-Uptime.ps1", "scriptMacOs": "get-uptime.sh" }
}"#;

const CLEAR_CACHE: &str = r#"{
    "name": "Clear-Cache",
    "scriptInfo": { "scriptMacOs": "clear-cache.sh" }
}"#;

fn write_descriptors(root: &Path) {
    fs::create_dir_all(root.join("windows/hardware")).unwrap();
    fs::create_dir_all(root.join("mac")).unwrap();
    fs::write(root.join("windows/hardware/get-battery.json"), GET_BATTERY).unwrap();
    fs::write(root.join("windows/get-uptime.json"), GET_UPTIME).unwrap();
    fs::write(root.join("mac/clear-cache.json"), CLEAR_CACHE).unwrap();
    // Noise the walk must ignore or survive.
    fs::write(root.join("mac/broken.json"), "{ not json").unwrap();
    fs::write(root.join("mac/nameless.json"), r#"{"description":"x"}"#).unwrap();
    fs::write(root.join("README.md"), "# Remote Actions").unwrap();
}

/// A sheet shaped like a pandas export: unnamed index column first, plus a taxonomy column.
fn write_category_sheet(path: &Path) {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in ["Name", "Category", "Internal", "Doc", "Subcategory"]
        .iter()
        .enumerate()
    {
        sheet.write_string(0, col as u16 + 1, *header).unwrap();
    }

    sheet.write_number(1, 0, 0).unwrap();
    sheet.write_string(1, 1, "Get-Battery").unwrap();
    sheet.write_string(1, 2, "Hardware").unwrap();
    sheet.write_boolean(1, 3, false).unwrap();
    sheet.write_string(1, 4, "https://docs.example/get-battery").unwrap();
    sheet.write_string(1, 5, "Power").unwrap();

    sheet.write_number(2, 0, 1).unwrap();
    sheet.write_string(2, 1, "Get-Uptime").unwrap();
    sheet.write_string(2, 2, "System").unwrap();
    sheet.write_string(2, 3, "no").unwrap();

    sheet.write_number(3, 0, 2).unwrap();
    sheet.write_string(3, 1, "Debug-Agent").unwrap();
    sheet.write_string(3, 2, "Support").unwrap();
    sheet.write_boolean(3, 3, true).unwrap();

    // Internal left blank: kept private.
    sheet.write_number(4, 0, 3).unwrap();
    sheet.write_string(4, 1, "Reset-Proxy").unwrap();
    sheet.write_string(4, 2, "Network").unwrap();

    // Row without a name is skipped.
    sheet.write_number(5, 0, 4).unwrap();
    sheet.write_string(5, 2, "Orphan").unwrap();

    workbook.save(path).unwrap();
}

fn category(name: &str, internal: bool) -> CategoryRecord {
    CategoryRecord {
        name: name.to_string(),
        category: Some("Hardware".to_string()),
        internal,
        doc: None,
        extra: Default::default(),
    }
}

#[test]
fn parse_folder_walks_nested_directories_and_skips_bad_files() {
    let dir = tempdir().unwrap();
    write_descriptors(dir.path());

    let records = parse_folder(dir.path()).expect("descriptors found");
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();

    assert_eq!(names, vec!["Clear-Cache", "Get-Uptime", "Get-Battery"]);
    let battery = records.iter().find(|r| r.name == "Get-Battery").unwrap();
    assert_eq!(battery.ra_type, RaType::Windows);
    assert_eq!(battery.purpose.as_deref(), Some("Troubleshooting"));
    assert!(battery.path.ends_with("windows/hardware/get-battery.json"));

    let uptime = records.iter().find(|r| r.name == "Get-Uptime").unwrap();
    assert_eq!(uptime.ra_type, RaType::Combined);
    assert_eq!(uptime.purpose, None);

    let cache = records.iter().find(|r| r.name == "Clear-Cache").unwrap();
    assert_eq!(cache.ra_type, RaType::MacOs);
}

#[test]
fn parse_folder_rejects_missing_root() {
    let dir = tempdir().unwrap();
    let err = parse_folder(&dir.path().join("nope")).unwrap_err();
    assert!(matches!(err, CatalogError::MissingFolder(_)));
}

#[test]
fn parse_folder_without_descriptors_reports_nothing_to_do() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "nothing here").unwrap();

    let err = parse_folder(dir.path()).unwrap_err();
    assert!(matches!(err, CatalogError::NoDescriptors(_)));
}

#[test]
fn load_categories_locates_columns_by_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("categories.xlsx");
    write_category_sheet(&path);

    let records = load_categories(&path).expect("categories load");
    let names: Vec<&str> = records.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Get-Battery", "Get-Uptime", "Debug-Agent", "Reset-Proxy"]);

    assert!(!records[0].internal);
    assert_eq!(records[0].doc.as_deref(), Some("https://docs.example/get-battery"));
    assert_eq!(records[0].extra.get("Subcategory").map(String::as_str), Some("Power"));
    assert!(!records[1].internal);
    assert!(records[1].doc.is_none());
    assert!(records[2].internal);
    assert!(records[3].internal);
}

#[test]
fn load_categories_requires_internal_column() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("categories.xlsx");
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "Name").unwrap();
    sheet.write_string(0, 1, "Category").unwrap();
    sheet.write_string(1, 0, "Get-Battery").unwrap();
    workbook.save(&path).unwrap();

    let err = load_categories(&path).unwrap_err();
    assert!(matches!(err, CatalogError::MissingColumn("Internal")));
}

#[test]
fn load_categories_reports_unreadable_workbook() {
    let dir = tempdir().unwrap();
    let err = load_categories(&dir.path().join("missing.xlsx")).unwrap_err();
    assert!(matches!(err, CatalogError::Workbook { .. }));
}

#[test]
fn full_catalog_from_disk_marks_get_battery_as_windows() {
    let dir = tempdir().unwrap();
    let json_root = dir.path().join("json");
    write_descriptors(&json_root);
    let sheet = dir.path().join("categories.xlsx");
    write_category_sheet(&sheet);

    let descriptors = parse_folder(&json_root).unwrap();
    let categories = load_categories(&sheet).unwrap();
    let joined = join_all(&categories, &descriptors).unwrap();

    let battery = joined.iter().find(|r| r.name == "Get-Battery").unwrap();
    assert_eq!(battery.ra_type, Some(RaType::Windows));
    assert_eq!(battery.category.as_deref(), Some("Hardware"));
    assert!(battery.path.is_some());

    let public: Vec<String> = publishable(&joined).into_iter().map(|r| r.name).collect();
    assert_eq!(public, vec!["Get-Battery".to_string(), "Get-Uptime".to_string()]);
}

#[test]
fn join_keeps_every_category_row() {
    let dir = tempdir().unwrap();
    write_descriptors(dir.path());
    let descriptors = parse_folder(dir.path()).unwrap();
    let categories = vec![category("Get-Battery", false), category("Not-Written-Yet", false)];

    let joined = join_all(&categories, &descriptors).unwrap();

    assert_eq!(joined.len(), 2);
    assert_eq!(joined[0].name, "Get-Battery");
    assert!(joined[0].description.is_some());
    assert_eq!(joined[1].name, "Not-Written-Yet");
    assert!(joined[1].description.is_none());
    assert!(joined[1].ra_type.is_none());
    assert!(joined[1].path.is_none());
}

#[test]
fn join_fails_on_empty_side() {
    let dir = tempdir().unwrap();
    write_descriptors(dir.path());
    let descriptors = parse_folder(dir.path()).unwrap();

    assert!(matches!(
        join_all(&[], &descriptors),
        Err(CatalogError::EmptyInput("category"))
    ));
    assert!(matches!(
        join_all(&[category("Get-Battery", false)], &[]),
        Err(CatalogError::EmptyInput("descriptor"))
    ));
}

#[test]
fn diff_lists_names_present_on_one_side_only() {
    let dir = tempdir().unwrap();
    write_descriptors(dir.path());
    let descriptors = parse_folder(dir.path()).unwrap();
    let categories = vec![
        category("Get-Battery", false),
        category("Get-Uptime", true),
        category("Reset-Proxy", false),
    ];

    let delta = diff(&descriptors, &categories);

    assert_eq!(delta.only_in_descriptors, vec!["Clear-Cache".to_string()]);
    assert_eq!(delta.only_in_categories, vec!["Reset-Proxy".to_string()]);
    assert_eq!(delta.names(), vec!["Clear-Cache".to_string(), "Reset-Proxy".to_string()]);
    let entries = delta.entries();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .any(|e| e.name == "Clear-Cache" && e.found_in == "json"));
}

#[test]
fn diff_of_matching_catalogs_is_empty() {
    let dir = tempdir().unwrap();
    write_descriptors(dir.path());
    let descriptors = parse_folder(dir.path()).unwrap();
    let categories: Vec<CategoryRecord> = descriptors
        .iter()
        .map(|d| category(&d.name, false))
        .collect();

    assert!(diff(&descriptors, &categories).is_empty());
}
