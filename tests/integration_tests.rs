use anyhow::Result;
use chrono::NaiveDate;
use delivery_report_builder::*;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use tempfile::TempDir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn january_request() -> AnalysisRequest {
    AnalysisRequest {
        pre_range: Some(DateRange::new(date(2025, 1, 1), date(2025, 1, 15))),
        post_range: Some(DateRange::new(date(2025, 1, 16), date(2025, 1, 31))),
        ..Default::default()
    }
}

fn write_file(dir: &TempDir, name: &str, contents: &str) -> Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

const DD_HEADER: &str =
    "Timestamp local date,Merchant store ID,Subtotal,Net total,Net total (for historical reference only),DoorDash order ID";

fn doordash_fixture(dir: &TempDir) -> Result<PathBuf> {
    // Pre window: two rows of the same order, 100 + 200 = 300 sales, 1 order.
    // Post window: one row, 500 sales, 1 order. Prior-year mirror with its
    // payout only in the historical column.
    let body = format!(
        "{}\n{}",
        DD_HEADER,
        [
            "01/05/2025,S1,100,80,0,O1",
            "01/06/2025,S1,200,160,0,O1",
            "01/20/2025,S1,500,400,0,O2",
            "01/05/2024,S1,250,0,200,O3",
            "01/20/2024,S1,400,0,320,O4",
        ]
        .join("\n")
    );
    write_file(dir, "dd-data.csv", &body)
}

const UE_BANNER: &str = "Report generated for review,,,,,,,,,,,,";
const UE_HEADER: &str =
    "Order ID,Store ID,A,B,C,D,E,F,Order date,Sales (excl. tax),Total payout,G,H";

fn uber_eats_fixture(dir: &TempDir) -> Result<PathBuf> {
    let body = format!(
        "{}\n{}\n{}",
        UE_BANNER,
        UE_HEADER,
        [
            "U1,S2,,,,,,,01/10/2025,120,90,,",
            "U2,S2,,,,,,,01/22/2025,180,140,,",
            "U3,S2,,,,,,,01/10/2024,100,75,,",
            "U4,S2,,,,,,,01/22/2024,150,110,,",
        ]
        .join("\n")
    );
    write_file(dir, "ue-data.csv", &body)
}

#[test]
fn test_end_to_end_two_platform_run() -> Result<()> {
    let dir = TempDir::new()?;
    let request = AnalysisRequest {
        doordash_file: Some(doordash_fixture(&dir)?),
        uber_eats_file: Some(uber_eats_fixture(&dir)?),
        ..january_request()
    };

    let report = run_analysis(&request)?;
    assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);

    // DoorDash sales: pre 300 (two rows, one order), post 500.
    let dd_sales = &report.doordash.sales["S1"];
    assert_eq!(dd_sales.pre, 300.0);
    assert_eq!(dd_sales.post, 500.0);
    assert_eq!(dd_sales.pre_vs_post, 200.0);
    assert_eq!(dd_sales.rounded().growth_pct, 66.7);

    // Repeated order id counts once per window.
    let dd_orders = &report.doordash.orders["S1"];
    assert_eq!(dd_orders.pre, 1.0);
    assert_eq!(dd_orders.post, 1.0);

    // Prior-year payouts come from the historical column only.
    let dd_payouts = &report.doordash.payouts["S1"];
    assert_eq!(dd_payouts.last_year_pre, 200.0);
    assert_eq!(dd_payouts.last_year_post, 320.0);

    // UberEats dates resolve positionally past the banner row.
    let ue_sales = &report.uber_eats.sales["S2"];
    assert_eq!(ue_sales.pre, 120.0);
    assert_eq!(ue_sales.post, 180.0);

    // Combined table outer-joins the two platforms' store ids.
    assert_eq!(report.combined_sales.len(), 2);
    assert_eq!(report.combined_sales["S1"].post, 500.0);
    assert_eq!(report.combined_sales["S2"].post, 180.0);

    Ok(())
}

#[test]
fn test_summary_consistent_with_store_tables() -> Result<()> {
    let dir = TempDir::new()?;
    let request = AnalysisRequest {
        doordash_file: Some(doordash_fixture(&dir)?),
        uber_eats_file: Some(uber_eats_fixture(&dir)?),
        ..january_request()
    };

    let report = run_analysis(&request)?;

    // Per-platform summary rows equal the sum of their store tables.
    let dd = report.doordash.summary.get(SummaryMetric::Sales);
    assert_eq!(dd.pre, 300.0);
    assert_eq!(dd.post, 500.0);

    // Combined summary: absolute rows add across platforms, ratios rebuild
    // from the combined bases.
    let combined = &report.combined_summary;
    assert_eq!(combined.get(SummaryMetric::Sales).post, 680.0);
    assert_eq!(combined.get(SummaryMetric::Orders).post, 2.0);
    assert_eq!(combined.get(SummaryMetric::Aov).post, 340.0);
    let profitability = combined.get(SummaryMetric::Profitability).post;
    assert!((profitability - (400.0 + 140.0) / 680.0 * 100.0).abs() < 1e-9);

    Ok(())
}

#[test]
fn test_missing_column_degrades_to_empty_tables() -> Result<()> {
    let dir = TempDir::new()?;
    let broken = write_file(
        &dir,
        "dd-data.csv",
        "Some date,Merchant store ID,Subtotal,Net total,DoorDash order ID\n01/05/2025,S1,100,80,O1\n",
    )?;
    let request = AnalysisRequest {
        doordash_file: Some(broken),
        uber_eats_file: Some(uber_eats_fixture(&dir)?),
        ..january_request()
    };

    let report = run_analysis(&request)?;

    // The unusable table is reported and empties out; the other platform's
    // numbers are unaffected.
    assert!(!report.diagnostics.is_empty());
    assert!(report.diagnostics[0].contains("Timestamp local date"));
    assert!(report.doordash.sales.is_empty());
    assert_eq!(report.uber_eats.sales["S2"].pre, 120.0);
    assert_eq!(report.combined_sales.len(), 1);

    Ok(())
}

#[test]
fn test_excluded_dates_drop_rows_everywhere() -> Result<()> {
    let dir = TempDir::new()?;
    let request = AnalysisRequest {
        doordash_file: Some(doordash_fixture(&dir)?),
        excluded_dates: vec![ExcludedDate::Text("01/06/2025".to_string())],
        ..january_request()
    };

    let report = run_analysis(&request)?;
    // The excluded day's 200 of sales disappears from the pre window.
    assert_eq!(report.doordash.sales["S1"].pre, 100.0);

    Ok(())
}

#[test]
fn test_new_customer_asymmetry() -> Result<()> {
    let dir = TempDir::new()?;
    let marketing = dir.path().join("marketing_jan");
    std::fs::create_dir(&marketing)?;
    std::fs::write(
        marketing.join("MARKETING_PROMOTION_2025.csv"),
        "Date,Store ID,New customers acquired\n\
         01/05/2025,M1,3\n\
         01/20/2025,M1,5\n\
         01/05/2024,M1,2\n\
         01/20/2024,M1,4\n",
    )?;

    let request = AnalysisRequest {
        doordash_file: Some(doordash_fixture(&dir)?),
        marketing_dir: Some(dir.path().to_path_buf()),
        uber_eats_new_customers: NewCustomerTotals {
            pre_prior: 10.0,
            post_prior: 12.0,
            pre_current: 20.0,
            post_current: 30.0,
        },
        // Selecting only the transaction store must not filter the marketing
        // figures, whose store ids come from a different namespace.
        doordash_selected_stores: Some(["S1".to_string()].into_iter().collect()),
        ..january_request()
    };

    let report = run_analysis(&request)?;

    // Per-store table from the marketing files.
    let row = &report.doordash.new_customers["M1"];
    assert_eq!(row.pre, 3.0);
    assert_eq!(row.post, 5.0);
    assert_eq!(row.last_year_post, 4.0);

    // DoorDash summary sums the marketing table despite the store selection.
    let dd_nc = report.doordash.summary.get(SummaryMetric::NewCustomers);
    assert_eq!(dd_nc.pre, 3.0);
    assert_eq!(dd_nc.post, 5.0);

    // UberEats carries only the supplied platform-wide totals.
    assert!(report.uber_eats.new_customers.is_empty());
    let ue_nc = report.uber_eats.summary.get(SummaryMetric::NewCustomers);
    assert_eq!(ue_nc.post, 30.0);
    assert_eq!(ue_nc.last_year_post, 12.0);

    // Combined row adds the per-store sum and the platform-wide total.
    let combined = report.combined_summary.get(SummaryMetric::NewCustomers);
    assert_eq!(combined.pre, 23.0);
    assert_eq!(combined.post, 35.0);

    Ok(())
}

#[test]
fn test_store_selection_filters_summary_only() -> Result<()> {
    let dir = TempDir::new()?;
    let body = format!(
        "{}\n{}",
        DD_HEADER,
        [
            "01/05/2025,S1,100,80,0,O1",
            "01/05/2025,S9,900,700,0,O9",
            "01/20/2025,S1,500,400,0,O2",
            "01/20/2025,S9,100,80,0,O10",
        ]
        .join("\n")
    );
    let path = write_file(&dir, "dd-data.csv", &body)?;

    let request = AnalysisRequest {
        doordash_file: Some(path),
        doordash_selected_stores: Some(["S1".to_string()].into_iter().collect()),
        ..january_request()
    };

    let report = run_analysis(&request)?;

    // Store tables keep every store; the summary respects the selection.
    assert_eq!(report.doordash.sales.len(), 2);
    assert_eq!(report.doordash.summary.get(SummaryMetric::Sales).pre, 100.0);
    assert_eq!(report.doordash.summary.get(SummaryMetric::Sales).post, 500.0);

    Ok(())
}

#[test]
fn test_no_selection_means_all_stores() -> Result<()> {
    let dir = TempDir::new()?;
    let body = format!(
        "{}\n{}",
        DD_HEADER,
        ["01/05/2025,S1,100,80,0,O1", "01/05/2025,S9,900,700,0,O9"].join("\n")
    );
    let path = write_file(&dir, "dd-data.csv", &body)?;

    let request = AnalysisRequest {
        doordash_file: Some(path),
        doordash_selected_stores: None,
        ..january_request()
    };

    let report = run_analysis(&request)?;
    assert_eq!(report.doordash.summary.get(SummaryMetric::Sales).pre, 1000.0);

    Ok(())
}

#[test]
fn test_leap_day_ranges_shift_cleanly() -> Result<()> {
    let dir = TempDir::new()?;
    // 2024-02-29 has no 2023 equivalent; the derived range clamps to 02-28,
    // picking up the prior-year row dated on the clamped day.
    let body = format!(
        "{}\n{}",
        DD_HEADER,
        ["02/29/2024,S1,500,400,0,O1", "02/28/2023,S1,300,0,240,O2"].join("\n")
    );
    let path = write_file(&dir, "dd-data.csv", &body)?;

    let request = AnalysisRequest {
        doordash_file: Some(path),
        pre_range: Some(DateRange::new(date(2024, 2, 1), date(2024, 2, 14))),
        post_range: Some(DateRange::new(date(2024, 2, 15), date(2024, 2, 29))),
        ..Default::default()
    };

    let report = run_analysis(&request)?;
    let sales = &report.doordash.sales["S1"];
    assert_eq!(sales.post, 500.0);
    assert_eq!(sales.last_year_post, 300.0);

    Ok(())
}

#[test]
fn test_campaign_pivot_from_marketing_files() -> Result<()> {
    let dir = TempDir::new()?;
    let marketing = dir.path().join("marketing_jan");
    std::fs::create_dir(&marketing)?;
    std::fs::write(
        marketing.join("MARKETING_PROMOTION_2025.csv"),
        "Date,Is self serve campaign,Orders,Sales,Customer discounts from marketing | (Funded by you)\n\
         01/20/2025,True,10,500,100\n\
         01/05/2025,True,99,9999,999\n\
         01/25/2025,False,4,200,0\n",
    )?;
    std::fs::write(
        marketing.join("MARKETING_SPONSORED_LISTING_2025.csv"),
        "Date,Is self serve campaign,Orders,Sales,Marketing fees | (including any applicable taxes)\n\
         01/22/2025,True,10,100,100\n",
    )?;

    let request = AnalysisRequest {
        marketing_dir: Some(dir.path().to_path_buf()),
        ..january_request()
    };

    let report = run_analysis(&request)?;

    // Post-range rows only: the 01/05 row is outside the post window.
    let promo = &report.campaigns.promotions["True"];
    assert_eq!(promo.sales, 500.0);
    assert_eq!(promo.roas, 5.0);

    // Combined pivot recomputes ROAS from summed sales and spend.
    let combined = &report.campaigns.combined["True"];
    assert_eq!(combined.sales, 600.0);
    assert_eq!(combined.spend, 200.0);
    assert_eq!(combined.roas, 3.0);

    Ok(())
}

#[test]
fn test_missing_ranges_do_not_crash() -> Result<()> {
    let dir = TempDir::new()?;
    let request = AnalysisRequest {
        doordash_file: Some(doordash_fixture(&dir)?),
        pre_range: None,
        post_range: None,
        ..Default::default()
    };

    let report = run_analysis(&request)?;
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.combined_sales.is_empty());

    Ok(())
}

#[test]
fn test_request_round_trips_for_persistence() -> Result<()> {
    let request = AnalysisRequest {
        doordash_file: Some(PathBuf::from("dd-data.csv")),
        excluded_dates: vec![
            ExcludedDate::Day(date(2025, 1, 10)),
            ExcludedDate::Text("01/11/2025".to_string()),
        ],
        uber_eats_selected_stores: Some(BTreeSet::from(["S2".to_string()])),
        ..january_request()
    };

    let json = serde_json::to_string_pretty(&request)?;
    let back: AnalysisRequest = serde_json::from_str(&json)?;
    assert_eq!(back.pre_range, request.pre_range);
    assert_eq!(back.excluded_dates.len(), 2);
    assert_eq!(
        back.uber_eats_selected_stores,
        Some(BTreeSet::from(["S2".to_string()]))
    );

    Ok(())
}
