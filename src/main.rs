use std::path::PathBuf;

use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use silvermoon::app::AppMode;
use silvermoon::common::{start_application, StartupConfig};

fn cli() -> Command {
    Command::new("silvermoon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("事件驱动的数据采集与分析编排系统")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，缺省时依次查找 config/silvermoon.toml、silvermoon.toml")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(
            Command::new("analyser")
                .about("运行分析器：监听事件，为匹配的任务调用推理服务并保存结果")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .value_name("NAME")
                        .help("分析器名称，同名进程共享同一个身份")
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("collector")
                .about("运行采集器：逐行读取 JSON 数据并保存为记录")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .value_name("NAME")
                        .help("采集器名称")
                        .required(true),
                )
                .arg(
                    Arg::new("input")
                        .short('i')
                        .long("input")
                        .value_name("FILE")
                        .help("JSON lines 输入文件，缺省时读取标准输入")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}

fn parse_app_mode(matches: &ArgMatches) -> Result<AppMode> {
    let name = |sub: &ArgMatches| -> Result<String> {
        sub.get_one::<String>("name")
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("缺少 --name 参数"))
    };

    match matches.subcommand() {
        Some(("analyser", sub)) => Ok(AppMode::Analyser { name: name(sub)? }),
        Some(("collector", sub)) => Ok(AppMode::Collector {
            name: name(sub)?,
            input: sub.get_one::<PathBuf>("input").cloned(),
        }),
        Some((other, _)) => Err(anyhow::anyhow!("不支持的运行模式: {other}")),
        None => Err(anyhow::anyhow!("缺少运行模式")),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let app_mode = parse_app_mode(&matches)?;

    let startup_config = StartupConfig {
        config_path: matches.get_one::<String>("config").cloned(),
        log_level: matches.get_one::<String>("log-level").cloned(),
        log_format: matches.get_one::<String>("log-format").cloned(),
    };

    start_application(startup_config, app_mode).await
}
