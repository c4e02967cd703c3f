use clap::Parser;
use vendor_ai::core::loader::load_vendors;
use vendor_ai::utils::logger;
use vendor_ai::{CliConfig, LocalStorage, VendorAiError, VendorAnalysisEngine};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // .env 不存在也沒關係
    let _ = dotenvy::dotenv();

    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose, cli.json_logs);

    tracing::info!("Starting vendor-ai CLI");

    if cli.dry_run {
        if let Err(e) = dry_run(&cli) {
            exit_with(&e);
        }
        return;
    }

    // 解析並驗證配置
    let config = match cli.resolve() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            exit_with(&e);
        }
    };
    if cli.verbose {
        tracing::debug!("Resolved config: {:?}", config);
    }

    let storage = LocalStorage::new(config.output_path.clone());
    let engine = match VendorAnalysisEngine::from_config(&config, storage) {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            exit_with(&e);
        }
    };

    match engine.run().await {
        Ok(report) => {
            print!("{}", report.rendered);
            for file in &report.saved_files {
                tracing::info!("📁 Saved: {}", file);
            }
            tracing::info!(
                "✅ Done: {} analyzed, {} skipped",
                report.completed.len(),
                report.failed.len()
            );
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Vendor analysis failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            exit_with(&e);
        }
    }
}

/// 只讀取 CSV 並列出供應商，不呼叫任何服務
fn dry_run(cli: &CliConfig) -> vendor_ai::Result<()> {
    let path = cli.input_path()?;
    let records = load_vendors(&path)?;

    println!("{} vendors in {}", records.len(), path);
    for record in &records {
        println!("  {} {}", record.name, record.formatted_amount());
    }
    Ok(())
}

fn exit_with(e: &VendorAiError) -> ! {
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    // 輸出用戶友好的錯誤信息
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 建議: {}", e.recovery_suggestion());

    std::process::exit(e.exit_code())
}
