//! named dingtalk destinations selected by the webhook url path
use anyhow::{Context, Result};
use hashbrown::HashMap;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, Default, Deserialize)]
/// one entry of the `profiles` config section
pub struct ProfileSettings {
    /// robot webhook url, e.g. `https://oapi.dingtalk.com/robot/send?access_token=...`
    #[serde(default)]
    pub url: String,
    /// comma separated phone numbers mentioned in every message
    #[serde(default)]
    pub mention: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// a profile that can be used for delivery
pub struct Profile {
    pub url: Url,
    pub mention: String,
}

/// The profiles by name. Built once at startup and only read afterwards.
#[derive(Debug)]
pub struct ProfileMap {
    profiles: HashMap<String, Option<Profile>>,
}

impl ProfileMap {
    pub fn new<'a>(settings: impl IntoIterator<Item = (&'a String, &'a ProfileSettings)>) -> Result<Self> {
        let mut profiles = HashMap::new();

        for (name, settings) in settings {
            let profile = if settings.url.is_empty() || settings.mention.is_empty() {
                tracing::warn!(
                    profile = name.as_str(),
                    "profile needs both url and mention to be usable, requests for it will be answered with 404"
                );
                None
            } else {
                let url = Url::parse(&settings.url)
                    .with_context(|| format!("invalid url for profile {name}"))?;

                Some(Profile {
                    url,
                    mention: settings.mention.clone(),
                })
            };

            profiles.insert(name.clone(), profile);
        }

        Ok(Self { profiles })
    }

    /// get a profile with a non empty url and mention list
    pub fn resolve(&self, name: &str) -> Option<&Profile> {
        self.profiles.get(name).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
