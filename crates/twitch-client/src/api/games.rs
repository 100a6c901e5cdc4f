use url::Url;

use super::*;

impl TwitchApiClient {
    /// Look up games (categories) by exact name.
    ///
    /// An empty result means none of the names matched.
    pub async fn get_games_by_name(
        &self,
        token: &Token,
        names: &[String],
    ) -> Result<Vec<Game>, TwitchError> {
        let Some(url) = build_games_url(names)? else {
            return Ok(Vec::new());
        };
        let body = self.authenticated_get(url.as_str(), token).await?;
        let resp: HelixResponse<Game> = serde_json::from_str(&body)?;
        Ok(resp.data)
    }
}

pub(super) fn build_games_url(names: &[String]) -> Result<Option<Url>, TwitchError> {
    let names: Vec<&str> = names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .take(100)
        .collect();
    if names.is_empty() {
        return Ok(None);
    }

    let mut url = Url::parse(&format!("{HELIX_BASE}/games"))?;
    {
        let mut query = url.query_pairs_mut();
        for name in names {
            query.append_pair("name", name);
        }
    }
    Ok(Some(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn games_url_encodes_names() {
        let names = vec!["Dota 2".to_string(), "Science & Technology".to_string()];
        let url = build_games_url(&names).unwrap().unwrap();

        assert_eq!(url.path(), "/helix/games");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("name".to_string(), "Dota 2".to_string()),
                ("name".to_string(), "Science & Technology".to_string()),
            ]
        );
    }

    #[test]
    fn games_url_skips_blank_names() {
        let names = vec!["  ".to_string()];
        assert!(build_games_url(&names).unwrap().is_none());
    }

    #[test]
    fn game_deserializes() {
        let body = r#"{
          "data": [{
            "id": "29595",
            "name": "Dota 2",
            "box_art_url": "https://static-cdn.jtvnw.net/ttv-boxart/29595-{width}x{height}.jpg",
            "igdb_id": "2963"
          }]
        }"#;
        let parsed: HelixResponse<Game> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.data[0].id, "29595");
        assert_eq!(parsed.data[0].name, "Dota 2");
    }
}
