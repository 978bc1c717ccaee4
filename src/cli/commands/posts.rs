use clap::Subcommand;
use reqwest::{multipart, Method};
use serde_json::Value;
use std::path::PathBuf;

use crate::cli::client::{image_part, ApiClient};
use crate::cli::config::*;
use crate::cli::utils::*;
use crate::cli::OutputFormat;

#[derive(Subcommand)]
pub enum PostsCommands {
    #[command(about = "List one page of the feed")]
    List {
        #[arg(long, default_value_t = 1, help = "Page number")]
        page: u32,
    },

    #[command(about = "Show a single post")]
    Show {
        #[arg(help = "Post ID")]
        id: String,
    },

    #[command(about = "Create a post with an image")]
    Create {
        #[arg(long, help = "Title (at least 5 characters)")]
        title: String,
        #[arg(long, help = "Content (at least 5 characters)")]
        content: String,
        #[arg(long, help = "PNG or JPEG file")]
        image: PathBuf,
    },

    #[command(about = "Edit one of your posts")]
    Update {
        #[arg(help = "Post ID")]
        id: String,
        #[arg(long, help = "New title (keeps current if omitted)")]
        title: Option<String>,
        #[arg(long, help = "New content (keeps current if omitted)")]
        content: Option<String>,
        #[arg(long, help = "Replacement image (keeps current if omitted)")]
        image: Option<PathBuf>,
    },

    #[command(about = "Delete one of your posts")]
    Delete {
        #[arg(help = "Post ID")]
        id: String,
    },
}

pub async fn handle(cmd: PostsCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let env_config = load_environment_config()?;
    let client = ApiClient::new(&env_config);
    client.require_token()?;

    match cmd {
        PostsCommands::List { page } => {
            let response = client.get(&format!("/feed/posts?page={}", page)).await?;
            match output_format {
                OutputFormat::Json => output_value(&output_format, &response),
                OutputFormat::Text => {
                    let posts = response.get("posts").and_then(Value::as_array).cloned().unwrap_or_default();
                    let total = response.get("totalItems").and_then(Value::as_i64).unwrap_or(0);
                    if posts.is_empty() {
                        println!("No posts on page {} ({} in total)", page, total);
                    } else {
                        for post in &posts {
                            println!("{}", format_post_line(post));
                        }
                        println!("Page {}, {} posts in total", page, total);
                    }
                    Ok(())
                }
            }
        }
        PostsCommands::Show { id } => {
            let response = client.get(&format!("/feed/post/{}", id)).await?;
            output_value(&output_format, &response["post"])
        }
        PostsCommands::Create { title, content, image } => {
            let form = multipart::Form::new()
                .text("title", title)
                .text("content", content)
                .part("image", image_part(&image).await?);

            let response = client.multipart(Method::POST, "/feed/post", form).await?;
            print_mutation(&output_format, &response)
        }
        PostsCommands::Update { id, title, content, image } => {
            // The API replaces every field, so fill the gaps from the current post.
            let current = client.get(&format!("/feed/post/{}", id)).await?;
            let current = &current["post"];
            let keep = |name: &str| current.get(name).and_then(Value::as_str).unwrap_or_default().to_string();

            let mut form = multipart::Form::new()
                .text("title", title.unwrap_or_else(|| keep("title")))
                .text("content", content.unwrap_or_else(|| keep("content")));
            form = match image {
                Some(path) => form.part("image", image_part(&path).await?),
                None => form.text("image", keep("imageUrl")),
            };

            let response = client
                .multipart(Method::PUT, &format!("/feed/post/{}", id), form)
                .await?;
            print_mutation(&output_format, &response)
        }
        PostsCommands::Delete { id } => {
            let response = client.delete(&format!("/feed/post/{}", id)).await?;
            let message = response.get("message").and_then(Value::as_str).unwrap_or("Deleted post.");
            output_success(&output_format, message, None)
        }
    }
}

fn print_mutation(output_format: &OutputFormat, response: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => output_value(output_format, response),
        OutputFormat::Text => {
            let message = response.get("message").and_then(Value::as_str).unwrap_or("Done");
            println!("✓ {}", message);
            println!("{}", format_post_line(&response["post"]));
            Ok(())
        }
    }
}
