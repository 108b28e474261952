use rand::Rng;
use serde::Deserialize;

use crate::models::news::{News, NewsForm};
use crate::store::Store;

const TOP_STORIES_URL: &str = "https://hacker-news.firebaseio.com/v0/topstories.json";
const ITEM_URL: &str = "https://hacker-news.firebaseio.com/v0/item";
pub const HN_SOURCE: &str = "Hacker News";
/// New stories stored per run.
pub const MAX_NEW_STORIES: usize = 10;
/// Story ids looked at per run, whether or not they turn out to be new.
const MAX_SCANNED: usize = 30;

#[derive(Debug, Deserialize, Default)]
pub struct HnStory {
    pub title: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub score: i64,
}

/// Insert payload for a story, or `None` when it has no title.
pub fn story_form(story: &HnStory) -> Option<NewsForm> {
    let title = story.title.as_deref().map(str::trim).filter(|t| !t.is_empty())?;
    Some(NewsForm {
        title: Some(title.to_string()),
        summary: Some(format!("From Hacker News - Score: {}", story.score)),
        content: Some(format!(
            "Read full article at: {}",
            story.url.as_deref().unwrap_or("N/A")
        )),
        source: Some(HN_SOURCE.to_string()),
        source_url: story.url.clone(),
        thumbnail: None,
        category: Some("TECHNOLOGY".to_string()),
        is_hot: Some(story.score > 100),
        hot_score: Some(story.score),
    })
}

/// Stores a story unless one with the same title already came from Hacker News.
pub fn store_story(store: &dyn Store, story: &HnStory) -> Option<News> {
    let form = story_form(story)?;
    let title = form.title.as_deref().unwrap_or_default();
    if store.news_find_by_title_source(title, HN_SOURCE).is_some() {
        return None;
    }
    match store.news_create(&form) {
        Ok(id) => {
            log::info!("[fetch] news: {}", title);
            store.news_find_by_id(id)
        }
        Err(e) => {
            log::warn!("[fetch] cannot store story {}: {}", title, e);
            None
        }
    }
}

/// Pulls the current top stories. Fails only when the story list itself
/// cannot be read; individual stories that fail are skipped.
pub fn fetch_hacker_news(store: &dyn Store) -> Result<Vec<News>, String> {
    let client = super::http_client()?;
    let ids: Vec<i64> = serde_json::from_value(super::get_json(&client, TOP_STORIES_URL)?)
        .map_err(|e| format!("unexpected topstories payload: {}", e))?;

    let mut stored = Vec::new();
    for id in ids.into_iter().take(MAX_SCANNED) {
        if stored.len() >= MAX_NEW_STORIES {
            break;
        }
        let story: HnStory = match super::get_json(&client, &format!("{}/{}.json", ITEM_URL, id))
            .and_then(|v| serde_json::from_value(v).map_err(|e| e.to_string()))
        {
            Ok(s) => s,
            Err(e) => {
                log::warn!("[fetch] story {}: {}", id, e);
                continue;
            }
        };
        if let Some(news) = store_story(store, &story) {
            stored.push(news);
        }
    }
    Ok(stored)
}

/// (title, summary, category, source). Titles carry today's date.
const SAMPLE_NEWS: &[(&str, &str, &str, &str)] = &[
    ("科技巨头发布最新AI产品", "人工智能领域迎来新突破，多家科技公司竞相发布新产品", "TECHNOLOGY", "科技日报"),
    ("全球股市震荡，投资者关注美联储动向", "金融市场分析：今日市场波动较大，建议谨慎操作", "FINANCE", "财经观察"),
    ("新能源汽车销量创新高", "新能源行业发展迅速，电动车渗透率持续攀升", "TECHNOLOGY", "汽车之家"),
    ("国际贸易协议达成重要共识", "国际经济合作新进展，多国签署贸易合作框架", "WORLD", "新华社"),
    ("A股市场今日行情分析", "今日上证指数、深证成指走势分析及明日预测", "FINANCE", "证券时报"),
    ("半导体产业链最新动态", "国产芯片研发取得重要突破，多个项目进入量产阶段", "TECHNOLOGY", "科技新闻"),
    ("楼市新政策出台", "多地放开限购政策，房地产市场迎来新变化", "FINANCE", "经济日报"),
    ("体育赛事热点", "各大体育赛事精彩回顾与赛事预告", "SPORTS", "体育频道"),
];

const SAMPLE_CONTENT: &str = "这是今日热点新闻，点击阅读全文了解更多详情。";

/// Writes the dated sample items. Items already present for today keep their
/// row and get a fresh `published_at` and hot score.
pub fn sample_news(store: &dyn Store) -> Vec<News> {
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    let mut rng = rand::thread_rng();
    let mut out = Vec::with_capacity(SAMPLE_NEWS.len());

    for (title, summary, category, source) in SAMPLE_NEWS {
        let title = format!("{} ({})", title, today);
        let hot_score = rng.gen_range(50..150);
        let result = match store.news_find_by_title_source(&title, source) {
            Some(existing) => store.news_refresh(existing.id, hot_score).map(|_| existing.id),
            None => store.news_create(&NewsForm {
                title: Some(title.clone()),
                summary: Some(summary.to_string()),
                content: Some(SAMPLE_CONTENT.to_string()),
                source: Some(source.to_string()),
                category: Some(category.to_string()),
                is_hot: Some(true),
                hot_score: Some(hot_score),
                ..Default::default()
            }),
        };
        match result {
            Ok(id) => out.extend(store.news_find_by_id(id)),
            Err(e) => log::warn!("[fetch] sample news {}: {}", title, e),
        }
    }
    log::info!("[fetch] wrote {} sample news items", out.len());
    out
}

/// Scheduled run: Hacker News, or the sample set when it is unreachable.
pub fn run_scheduled(store: &dyn Store) -> usize {
    match fetch_hacker_news(store) {
        Ok(stored) => stored.len(),
        Err(e) => {
            log::warn!("[fetch] Hacker News unavailable: {}", e);
            sample_news(store).len()
        }
    }
}

/// Manual trigger: also falls back when the fetch stored nothing.
pub fn fetch_manually(store: &dyn Store) -> Vec<News> {
    match fetch_hacker_news(store) {
        Ok(stored) if !stored.is_empty() => stored,
        Ok(_) => {
            log::info!("[fetch] no new stories, using sample news");
            sample_news(store)
        }
        Err(e) => {
            log::warn!("[fetch] Hacker News unavailable: {}", e);
            sample_news(store)
        }
    }
}
