use anyhow::{Result, anyhow};
use std::io::{self, Write};

#[derive(clap::ValueEnum, Clone)]
pub enum ServiceKind {
    Gmail,
}

pub async fn run(service: ServiceKind) -> Result<()> {
    match service {
        ServiceKind::Gmail => {
            use crate::google::oauth::exchange_code_for_token;

            // Prompt the user for the mailbox they are authorizing
            print!("Enter the email address you are authenticating: ");
            io::stdout().flush().unwrap();
            let mut user_email = String::new();
            io::stdin()
                .read_line(&mut user_email)
                .expect("Failed to read email address");
            let user_email = user_email.trim().to_owned();

            let client_id = std::env::var("MAILKEY_GMAIL_CLIENT_ID")
                .expect("Set MAILKEY_GMAIL_CLIENT_ID in your environment");
            let client_secret = std::env::var("MAILKEY_GMAIL_CLIENT_SECRET")
                .expect("Set MAILKEY_GMAIL_CLIENT_SECRET in your environment");
            let redirect_uri = std::env::var("MAILKEY_GMAIL_REDIRECT_URI")
                .unwrap_or_else(|_| "urn:ietf:wg:oauth:2.0:oob".to_string());
            let scope = "https://www.googleapis.com/auth/gmail.modify";
            let auth_url = format!(
                "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
                urlencoding::encode(&client_id),
                urlencoding::encode(&redirect_uri),
                urlencoding::encode(scope)
            );
            println!(
                "\nPlease open the following URL in your browser and authorize access:\n\n{}\n",
                auth_url
            );
            print!("Paste the authorization code shown by Google here: ");
            io::stdout().flush().unwrap();
            let mut code = String::new();
            io::stdin()
                .read_line(&mut code)
                .expect("Failed to read code");
            let code = code.trim();

            let token =
                exchange_code_for_token(&client_id, &client_secret, code, &redirect_uri).await?;
            let refresh_token = token
                .refresh_token
                .ok_or(anyhow!("No refresh token in response"))?;

            // Print a ready-to-paste entry for the mailboxes file
            println!("\nAdd this to the mailboxes file under \"mailboxes\":\n");
            println!(
                "  \"{}\": {{\n    \"client_id\": \"{}\",\n    \"client_secret\": \"{}\",\n    \"redirect_uri\": \"{}\",\n    \"refresh_token\": \"{}\"\n  }}",
                user_email, client_id, client_secret, redirect_uri, refresh_token
            );
        }
    }

    Ok(())
}
