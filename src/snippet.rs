//! Inline scripts of the analytics integration.
//!
//! The page and the policy must agree byte for byte: hash mode authorizes
//! exactly the text returned by [`SnippetSource`], so markup has to be
//! produced from the same values (see [`PiwikSnippet::render`]).

use crate::constants::MARKER_DATA_SOURCE;
use crate::core::config::AnalyticsConfig;
use crate::error::CspError;
use serde::Serialize;

/// Provider of the two inline scripts authorized in hash mode.
pub trait SnippetSource {
    /// Container bootstrap script, without the surrounding `<script>` tag.
    fn body_script(&self) -> String;

    /// dataLayer push script, without the surrounding `<script>` tag.
    fn data_layer_script(&self) -> String;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    Anonymous,
    User,
    Admin,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SearchValues {
    pub search_term: String,
    pub search_page: u32,
    pub search_results: u64,
    pub search_filters: String,
}

/// Values pushed to the dataLayer for the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DataLayer {
    pub site_name: String,
    pub site_env: String,
    pub page_title: String,
    pub page_type: String,
    pub page_language: String,
    pub user_type: UserType,
    #[serde(flatten)]
    pub search: Option<SearchValues>,
}

impl Default for DataLayer {
    fn default() -> Self {
        Self {
            site_name: String::new(),
            site_env: String::new(),
            page_title: String::new(),
            page_type: "undefined".to_owned(),
            page_language: String::new(),
            user_type: UserType::default(),
            search: None,
        }
    }
}

impl DataLayer {
    pub fn for_site(config: &AnalyticsConfig) -> Self {
        Self {
            site_name: config.site_name().to_owned(),
            site_env: config.site_environment().to_owned(),
            ..Self::default()
        }
    }

    pub fn page(mut self, title: impl Into<String>, page_type: impl Into<String>) -> Self {
        self.page_title = title.into();
        self.page_type = page_type.into();
        self
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.page_language = language.into();
        self
    }

    pub fn user_type(mut self, user_type: UserType) -> Self {
        self.user_type = user_type;
        self
    }

    pub fn search(mut self, search: SearchValues) -> Self {
        self.search = Some(search);
        self
    }

    /// JSON object literal safe to embed in an inline script.
    pub fn to_script_json(&self) -> Result<String, CspError> {
        Ok(serde_json::to_string(self)?.replace('<', "\\u003c"))
    }
}

const BODY_HEAD: &str = r#"(function(window, document, dataLayerName, id) {window[dataLayerName]=window[dataLayerName]||[],window[dataLayerName].push({start:(new Date).getTime(),event:"stg.start"});var scripts=document.getElementsByTagName('script')[0],tags=document.createElement('script'); function stgCreateCookie(a,b,c){var d="";if(c){var e=new Date;e.setTime(e.getTime()+24*c*60*60*1e3),d="; expires="+e.toUTCString()}document.cookie=a+"="+b+d+"; path=/; Secure"} var isStgDebug=(window.location.href.match("stg_debug")||document.cookie.match("stg_debug"))&&!window.location.href.match("stg_disable_debug");stgCreateCookie("stg_debug",isStgDebug?1:"",isStgDebug?14:-1); var qP=[];dataLayerName!=="dataLayer"&&qP.push("data_layer_name="+dataLayerName),qP.push("use_secure_cookies"),isStgDebug&&qP.push("stg_debug");var qPString=qP.length>0?("?"+qP.join("&")):""; tags.async=!0,tags.src=""#;
const BODY_AFTER_DOMAIN: &str = r#""+id+".js"+qPString,scripts.parentNode.insertBefore(tags,scripts); !function(a,n,i){a[n]=a[n]||{};for(var c=0;c<i.length;c++)!function(i){a[n][i]=a[n][i]||{},a[n][i].api=a[n][i].api||function(){var a=[].slice.call(arguments,0);"string"==typeof a[0]&&window[dataLayerName].push({event:n+"."+i+":"+a[0],parameters:[].slice.call(arguments,1)})}}(i[c])}(window,"ppms",["tm","cm"]);})(window, document, '"#;

/// Snippets of a Piwik PRO tag manager container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PiwikSnippet {
    domain: String,
    tracking_id: String,
    data_layer_name: String,
    data_layer_json: String,
}

impl PiwikSnippet {
    pub fn new(config: &AnalyticsConfig, data_layer: &DataLayer) -> Result<Self, CspError> {
        Ok(Self {
            domain: config.domain().map(|d| d.as_str().to_owned()).unwrap_or_default(),
            tracking_id: config.tracking_id().to_owned(),
            data_layer_name: config.data_layer_name().to_owned(),
            data_layer_json: data_layer.to_script_json()?,
        })
    }

    /// The container tag carrying the nonce marker looked up by
    /// [`NonceExtractor`](crate::security::NonceExtractor).
    pub fn render_tag(&self, nonce: &str) -> String {
        format!(
            r#"<script type="text/javascript" data-source="{}" nonce="{}">{}</script>"#,
            MARKER_DATA_SOURCE,
            nonce,
            self.body_script()
        )
    }

    pub fn render_data_layer_tag(&self, nonce: &str) -> String {
        format!(
            r#"<script type="text/javascript" nonce="{}">{}</script>"#,
            nonce,
            self.data_layer_script()
        )
    }

    /// dataLayer push followed by the container tag.
    pub fn render(&self, nonce: &str) -> String {
        let mut markup = self.render_data_layer_tag(nonce);
        markup.push_str(&self.render_tag(nonce));
        markup
    }
}

impl SnippetSource for PiwikSnippet {
    fn body_script(&self) -> String {
        let mut script = String::with_capacity(
            BODY_HEAD.len()
                + BODY_AFTER_DOMAIN.len()
                + self.domain.len()
                + self.data_layer_name.len()
                + self.tracking_id.len()
                + 8,
        );
        script.push_str(BODY_HEAD);
        script.push_str(&self.domain);
        script.push_str(BODY_AFTER_DOMAIN);
        script.push_str(&self.data_layer_name);
        script.push_str("', '");
        script.push_str(&self.tracking_id);
        script.push_str("');");
        script
    }

    fn data_layer_script(&self) -> String {
        let name = &self.data_layer_name;
        format!(
            "window.{name} = window.{name} || [];window.{name}.push({});",
            self.data_layer_json
        )
    }
}
