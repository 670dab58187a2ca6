use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use shoebox::commands::{CommandResponse, Commands};
use shoebox::config::Config;
use shoebox::export::ExportProgress;
use shoebox::import::ImportProgress;
use shoebox::logging;

struct Cli {
    config_path: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Cli {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = Vec::new();

    let mut i = 1;
    while i < args.len() {
        if !command.is_empty() {
            command.push(args[i].clone());
            i += 1;
            continue;
        }
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("shoebox {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            arg if arg.starts_with('-') => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                std::process::exit(1);
            }
            _ => command.push(args[i].clone()),
        }
        i += 1;
    }

    Cli {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"shoebox - local-first photo organizer

USAGE:
    shoebox [OPTIONS] <COMMAND> [ARGS]

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

IMPORT:
    import FILE... [--album ID]         Import image files
    import-folder DIR [--album ID]      Import every image under a folder
    import-google [--album ID]          Import from the Google Photos library
    auth                                Authorize Google Photos access

IMAGES:
    images                              List all images
    image ID                            Show one image
    rename ID NAME                      Change an image's display name
    delete ID                           Delete an image and its files
    bulk-delete ID...                   Delete several images
    path STORED_PATH                    Resolve a stored path
    thumbnails                          Generate missing thumbnails

TAGS:
    tags                                List all tags
    used-tags                           List tags attached to images
    create-tag NAME                     Create a tag
    tag IMAGE_ID TAG_ID                 Attach a tag
    untag IMAGE_ID TAG_ID               Detach a tag
    image-tags IMAGE_ID                 Tags of an image
    search [TAG_ID...]                  Images with any of the tags

ALBUMS:
    albums                              List all albums
    create-album NAME                   Create an album
    album ID                            Images in an album
    album-add IMAGE_ID ALBUM_ID         Add an image to an album
    album-remove IMAGE_ID ALBUM_ID      Remove an image from an album
    image-albums IMAGE_ID               Albums of an image
    unassigned                          Images in no album
    delete-album ID [--delete-photos]   Delete an album

EXPORT:
    export OUTPUT.zip ID...             Export images as a zip archive

ENVIRONMENT:
    SHOEBOX_CONFIG      Path to config file (overrides default location)
    SHOEBOX_LOG         Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/shoebox/config.toml"#
    );
}

fn main() -> Result<()> {
    let cli = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(Some(Config::config_dir().join("logs")));

    if cli.command.is_empty() {
        print_help();
        std::process::exit(1);
    }

    let config = match cli.config_path {
        Some(path) => Config::load_from(&path)?,
        None => Config::load()?,
    };

    let mut commands = Commands::open(config)?;
    let response = dispatch(&commands, &cli.command);
    commands.close()?;

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Run `shoebox --help` for usage.");
            std::process::exit(1);
        }
    };

    println!("{}", serde_json::to_string_pretty(&response)?);
    if !response.success {
        std::process::exit(1);
    }
    Ok(())
}

fn dispatch(commands: &Commands, command: &[String]) -> Result<CommandResponse> {
    let (name, rest) = command
        .split_first()
        .ok_or_else(|| anyhow!("missing command"))?;
    let mut args: Vec<String> = rest.to_vec();

    let response = match name.as_str() {
        "import" => {
            let album = take_option(&mut args, "--album")?;
            if args.is_empty() {
                bail!("import requires at least one file");
            }
            let paths: Vec<PathBuf> = args.iter().map(PathBuf::from).collect();
            with_import_progress(|tx| commands.import_files(&paths, album, Some(tx)))
        }
        "import-folder" => {
            let album = take_option(&mut args, "--album")?;
            let [folder] = exact::<1>(&args, "import-folder DIR")?;
            let folder = PathBuf::from(folder);
            with_import_progress(|tx| commands.import_folder(&folder, album, Some(tx)))
        }
        "import-google" => {
            let album = take_option(&mut args, "--album")?;
            exact::<0>(&args, "import-google")?;
            with_import_progress(|tx| commands.import_external(album, Some(tx)))
        }
        "auth" => {
            exact::<0>(&args, "auth")?;
            commands.authorize_external()
        }
        "images" => {
            exact::<0>(&args, "images")?;
            commands.list_images()
        }
        "image" => {
            let [id] = exact::<1>(&args, "image ID")?;
            commands.get_image(parse_id(id)?)
        }
        "rename" => {
            let [id, new_name] = exact::<2>(&args, "rename ID NAME")?;
            commands.rename_image(parse_id(id)?, new_name)
        }
        "delete" => {
            let [id] = exact::<1>(&args, "delete ID")?;
            commands.delete_image(parse_id(id)?)
        }
        "bulk-delete" => commands.bulk_delete_images(&parse_ids(&args)?),
        "path" => {
            let [stored] = exact::<1>(&args, "path STORED_PATH")?;
            commands.full_path(stored)
        }
        "thumbnails" => {
            exact::<0>(&args, "thumbnails")?;
            commands.generate_missing_thumbnails()
        }
        "tags" => {
            exact::<0>(&args, "tags")?;
            commands.list_tags()
        }
        "used-tags" => {
            exact::<0>(&args, "used-tags")?;
            commands.list_used_tags()
        }
        "create-tag" => {
            let [tag_name] = exact::<1>(&args, "create-tag NAME")?;
            commands.create_tag(tag_name)
        }
        "tag" => {
            let [image, tag] = exact::<2>(&args, "tag IMAGE_ID TAG_ID")?;
            commands.add_tag_to_image(parse_id(image)?, parse_id(tag)?)
        }
        "untag" => {
            let [image, tag] = exact::<2>(&args, "untag IMAGE_ID TAG_ID")?;
            commands.remove_tag_from_image(parse_id(image)?, parse_id(tag)?)
        }
        "image-tags" => {
            let [image] = exact::<1>(&args, "image-tags IMAGE_ID")?;
            commands.tags_for_image(parse_id(image)?)
        }
        "search" => commands.search_by_tags(&parse_ids(&args)?),
        "albums" => {
            exact::<0>(&args, "albums")?;
            commands.list_albums()
        }
        "create-album" => {
            let [album_name] = exact::<1>(&args, "create-album NAME")?;
            commands.create_album(album_name)
        }
        "album" => {
            let [album] = exact::<1>(&args, "album ID")?;
            commands.album_images(parse_id(album)?)
        }
        "album-add" => {
            let [image, album] = exact::<2>(&args, "album-add IMAGE_ID ALBUM_ID")?;
            commands.add_image_to_album(parse_id(image)?, parse_id(album)?)
        }
        "album-remove" => {
            let [image, album] = exact::<2>(&args, "album-remove IMAGE_ID ALBUM_ID")?;
            commands.remove_image_from_album(parse_id(image)?, parse_id(album)?)
        }
        "image-albums" => {
            let [image] = exact::<1>(&args, "image-albums IMAGE_ID")?;
            commands.albums_for_image(parse_id(image)?)
        }
        "unassigned" => {
            exact::<0>(&args, "unassigned")?;
            commands.unassigned_images()
        }
        "delete-album" => {
            let delete_photos = take_switch(&mut args, "--delete-photos");
            let [album] = exact::<1>(&args, "delete-album ID [--delete-photos]")?;
            commands.delete_album(parse_id(album)?, delete_photos)
        }
        "export" => {
            let (dest, ids) = args
                .split_first()
                .ok_or_else(|| anyhow!("usage: export OUTPUT.zip ID..."))?;
            let ids = parse_ids(ids)?;
            let dest = PathBuf::from(dest);
            with_export_progress(|tx| commands.export_zip(&ids, &dest, Some(tx)))
        }
        other => bail!("unknown command: {}", other),
    };

    Ok(response)
}

/// Run an import while a helper thread prints progress to stderr.
fn with_import_progress<F>(run: F) -> CommandResponse
where
    F: FnOnce(mpsc::Sender<ImportProgress>) -> CommandResponse,
{
    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for event in rx {
            match event {
                ImportProgress::Started { total } => eprintln!("Importing {} items", total),
                ImportProgress::Item { current, total, name } => {
                    eprintln!("[{}/{}] {}", current, total, name)
                }
                ImportProgress::Completed { imported, failed } => {
                    eprintln!("Imported {}, failed {}", imported, failed)
                }
            }
        }
    });
    let response = run(tx);
    let _ = printer.join();
    response
}

fn with_export_progress<F>(run: F) -> CommandResponse
where
    F: FnOnce(mpsc::Sender<ExportProgress>) -> CommandResponse,
{
    let (tx, rx) = mpsc::channel();
    let printer = thread::spawn(move || {
        for event in rx {
            if let ExportProgress::Item { current, total, image_id } = event {
                eprintln!("[{}/{}] image {}", current, total, image_id);
            }
        }
    });
    let response = run(tx);
    let _ = printer.join();
    response
}

fn exact<'a, const N: usize>(args: &'a [String], usage: &str) -> Result<[&'a str; N]> {
    if args.len() != N {
        bail!("usage: {}", usage);
    }
    let mut out = [""; N];
    for (slot, arg) in out.iter_mut().zip(args) {
        *slot = arg.as_str();
    }
    Ok(out)
}

fn take_option(args: &mut Vec<String>, flag: &str) -> Result<Option<i64>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    if pos + 1 >= args.len() {
        bail!("{} requires a value", flag);
    }
    let value = args.remove(pos + 1);
    args.remove(pos);
    parse_id(&value).map(Some)
}

fn take_switch(args: &mut Vec<String>, flag: &str) -> bool {
    match args.iter().position(|a| a == flag) {
        Some(pos) => {
            args.remove(pos);
            true
        }
        None => false,
    }
}

fn parse_id(value: &str) -> Result<i64> {
    value
        .parse()
        .with_context(|| format!("invalid id: {}", value))
}

fn parse_ids(values: &[String]) -> Result<Vec<i64>> {
    values.iter().map(|v| parse_id(v)).collect()
}
