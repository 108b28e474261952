use std::fs;
use std::path::Path;

pub const DEFAULT_THEME_ID: &str = "default";

const MANIFEST: &str = r##"id: default
name: Default Theme
version: 1.0.0
author:
  name: Inkpot
  website: https://github.com/inkpot
description: A clean and responsive default theme for the blog
screenshot: screenshot.png
requires: "1.0.0"

settings:
  - group: general
    label: General Settings
    items:
      - name: siteName
        label: Site Name
        type: text
        defaultValue: My Blog
      - name: siteDescription
        label: Site Description
        type: textarea
        defaultValue: A personal blog
  - group: appearance
    label: Appearance
    items:
      - name: darkMode
        label: Enable Dark Mode
        type: switch
        defaultValue: true
      - name: primaryColor
        label: Primary Color
        type: color
        defaultValue: "#6366f1"
      - name: fontSize
        label: Base Font Size
        type: select
        defaultValue: medium
        options:
          - label: Small
            value: small
          - label: Medium
            value: medium
          - label: Large
            value: large
      - name: postsPerRow
        label: Posts per row
        type: number
        defaultValue: 2
        min: 1
        max: 4
  - group: sidebar
    label: Sidebar
    items:
      - name: showSidebar
        label: Show Sidebar
        type: switch
        defaultValue: true
      - name: showCategories
        label: Show Categories Widget
        type: switch
        defaultValue: true
      - name: showTags
        label: Show Tags Widget
        type: switch
        defaultValue: true
      - name: showRecentPosts
        label: Show Recent Posts Widget
        type: switch
        defaultValue: true

i18n:
  defaultLocale: en
  supportedLocales:
    - en
    - zh-CN

features:
  darkMode: true
  responsive: true
  pwa: false
  comments: true
  search: true
"##;

const LAYOUT: &str = r##"<!DOCTYPE html>
<html lang="{{ locale }}">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{% block title %}{{ site.title }}{% endblock title %}</title>
    {% if site.favicon %}<link rel="icon" href="{{ site.favicon }}">{% endif %}
    <link rel="stylesheet" href="{{ asset_base | safe }}/css/style.css">
    <style>:root { --primary-color: {{ settings.primaryColor | default(value="#6366f1") }}; }</style>
    {% include "fragments/head.html" %}
</head>
<body class="font-{{ settings.fontSize | default(value="medium") }}{% if settings.darkMode %} dark-mode{% endif %}">
    <header class="site-header">
        <nav class="navbar">
            <a href="{{ home_url | safe }}" class="logo">{{ settings.siteName | default(value=site.title) }}</a>
            <ul class="nav-menu">
                <li><a href="{{ home_url | safe }}">{{ i18n.nav.home | default(value="Home") }}</a></li>
            </ul>
            {% if config.darkMode %}<button id="dark-mode-toggle" type="button">&#9680;</button>{% endif %}
        </nav>
    </header>

    <main class="main-content">
        <div class="container">
            <div class="content-wrapper{% if settings.showSidebar %} with-sidebar{% endif %}">
                <div class="content">
                    {% block content %}{% endblock content %}
                </div>
                {% if settings.showSidebar %}
                <aside class="sidebar">
                    {% include "fragments/sidebar.html" %}
                </aside>
                {% endif %}
            </div>
        </div>
    </main>

    <footer class="site-footer">
        <div class="container">
            <p>{% if site.copyright %}{{ site.copyright }}{% else %}&copy; {{ site.title }}{% endif %}</p>
        </div>
    </footer>

    <script src="{{ asset_base | safe }}/js/main.js"></script>
</body>
</html>
"##;

const INDEX: &str = r##"{% extends "layout.html" %}
{% block content %}
<section class="posts-section">
    <h1>{{ i18n.index.latestPosts | default(value="Latest Posts") }}</h1>
    <div class="posts-grid cols-{{ settings.postsPerRow | default(value=2) }}">
        {% for p in posts %}
        <article class="post-card">
            {% if p.thumbnail %}<img src="{{ p.thumbnail }}" alt="" class="post-thumbnail">{% endif %}
            <div class="post-content">
                <h2><a href="{{ base | safe }}/posts/{{ p.slug }}">{{ p.title }}</a></h2>
                <p class="post-meta">
                    {% if p.author_name %}<span>{{ p.author_name }}</span>{% endif %}
                    {% if p.published_at %}<span>{{ p.published_at | truncate(length=10, end="") }}</span>{% endif %}
                </p>
                {% if p.summary %}<p class="post-summary">{{ p.summary }}</p>{% endif %}
                {% if p.tags %}
                <div class="post-tags">
                    {% for t in p.tags %}<span class="tag">{{ t }}</span>{% endfor %}
                </div>
                {% endif %}
            </div>
        </article>
        {% else %}
        <p class="empty">{{ i18n.index.noPosts | default(value="No posts yet.") }}</p>
        {% endfor %}
    </div>

    {% if pagination and pagination.pages > 1 %}
    <nav class="pagination">
        {% if pagination.has_previous %}<a href="{{ pagination.prev_url | safe }}" class="page-link">{{ i18n.pagination.previous | default(value="Previous") }}</a>{% endif %}
        <span>{{ pagination.current + 1 }} / {{ pagination.pages }}</span>
        {% if pagination.has_next %}<a href="{{ pagination.next_url | safe }}" class="page-link">{{ i18n.pagination.next | default(value="Next") }}</a>{% endif %}
    </nav>
    {% endif %}
</section>
{% endblock content %}
"##;

const POST: &str = r##"{% extends "layout.html" %}
{% block title %}{{ post.title }} - {{ site.title }}{% endblock title %}
{% block content %}
<article class="post-single">
    <header class="post-header">
        <h1>{{ post.title }}</h1>
        <div class="post-meta">
            {% if post.author_name %}<span class="author">{{ post.author_name }}</span>{% endif %}
            {% if post.published_at %}<span class="date">{{ post.published_at | truncate(length=10, end="") }}</span>{% endif %}
            {% if post.category_name %}<span class="category">{{ post.category_name }}</span>{% endif %}
            <span class="views">{{ i18n.post.views | default(value="Views") }}: {{ post.view_count }}</span>
        </div>
    </header>

    {% if post.thumbnail %}<img src="{{ post.thumbnail }}" alt="" class="post-featured-image">{% endif %}

    <div class="post-content">{% if post.content %}{{ post.content | safe }}{% endif %}</div>

    <footer class="post-footer">
        {% if post.tags %}
        <div class="post-tags">
            <span>{{ i18n.post.tags | default(value="Tags:") }}</span>
            {% for t in post.tags %}<span class="tag">{{ t }}</span>{% endfor %}
        </div>
        {% endif %}
    </footer>

    {% if post.allow_comment and config.comments %}
    <section class="comments-section">
        <h3>{{ i18n.post.comments | default(value="Comments") }}</h3>
        <div id="comments-container" data-post-id="{{ post.id }}"></div>
    </section>
    {% endif %}
</article>
{% endblock content %}
"##;

const SIDEBAR: &str = r##"{% if settings.showCategories %}
<div class="widget categories-widget">
    <h3>{{ i18n.sidebar.categories | default(value="Categories") }}</h3>
    <ul>
        {% for c in categories %}<li>{{ c.name }} ({{ c.post_count }})</li>{% endfor %}
    </ul>
</div>
{% endif %}
{% if settings.showTags %}
<div class="widget tags-widget">
    <h3>{{ i18n.sidebar.tags | default(value="Tags") }}</h3>
    <div class="tag-cloud">
        {% for t in tags %}<span class="tag">{{ t.name }}</span>{% endfor %}
    </div>
</div>
{% endif %}
{% if settings.showRecentPosts %}
<div class="widget recent-posts-widget">
    <h3>{{ i18n.sidebar.recentPosts | default(value="Recent Posts") }}</h3>
    <ul>
        {% for p in recent_posts %}<li><a href="{{ base | safe }}/posts/{{ p.slug }}">{{ p.title }}</a></li>{% endfor %}
    </ul>
</div>
{% endif %}
"##;

const HEAD: &str = r##"{% if site.description %}<meta name="description" content="{{ site.description }}">{% endif %}
"##;

const STYLE_CSS: &str = r##"/* Default theme */
:root {
    --primary-color: #6366f1;
    --text-color: #1f2937;
    --text-muted: #6b7280;
    --bg-color: #ffffff;
    --bg-secondary: #f3f4f6;
    --border-color: #e5e7eb;
}

.dark-mode {
    --text-color: #f9fafb;
    --text-muted: #9ca3af;
    --bg-color: #111827;
    --bg-secondary: #1f2937;
    --border-color: #374151;
}

* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
    background: var(--bg-color);
    color: var(--text-color);
    line-height: 1.6;
}

body.font-small { font-size: 14px; }
body.font-medium { font-size: 16px; }
body.font-large { font-size: 18px; }

.container { max-width: 1200px; margin: 0 auto; padding: 0 20px; }

.site-header { background: var(--bg-secondary); border-bottom: 1px solid var(--border-color); padding: 1rem 0; }
.navbar { display: flex; justify-content: space-between; align-items: center; max-width: 1200px; margin: 0 auto; padding: 0 20px; }
.logo { font-size: 1.5rem; font-weight: bold; color: var(--primary-color); text-decoration: none; }
.nav-menu { display: flex; list-style: none; gap: 2rem; }
.nav-menu a { color: var(--text-color); text-decoration: none; }
.nav-menu a:hover { color: var(--primary-color); }

.main-content { min-height: calc(100vh - 200px); padding: 2rem 0; }
.content-wrapper.with-sidebar { display: grid; grid-template-columns: 1fr 300px; gap: 2rem; }

.posts-grid { display: grid; gap: 1.5rem; margin-top: 1.5rem; }
.posts-grid.cols-1 { grid-template-columns: 1fr; }
.posts-grid.cols-2 { grid-template-columns: repeat(2, 1fr); }
.posts-grid.cols-3 { grid-template-columns: repeat(3, 1fr); }
.posts-grid.cols-4 { grid-template-columns: repeat(4, 1fr); }

.post-card { background: var(--bg-secondary); border: 1px solid var(--border-color); border-radius: 8px; overflow: hidden; }
.post-card .post-content { padding: 1rem; }
.post-card h2 a { color: var(--text-color); text-decoration: none; }
.post-card h2 a:hover { color: var(--primary-color); }
.post-thumbnail, .post-featured-image { width: 100%; display: block; }
.post-meta { color: var(--text-muted); font-size: 0.875rem; display: flex; gap: 1rem; }
.tag { display: inline-block; background: var(--primary-color); color: #fff; border-radius: 4px; padding: 0 0.5rem; margin: 0 0.25rem 0.25rem 0; font-size: 0.75rem; }

.pagination { display: flex; justify-content: center; gap: 1rem; margin-top: 2rem; }
.page-link { color: var(--primary-color); }

.widget { background: var(--bg-secondary); border: 1px solid var(--border-color); border-radius: 8px; padding: 1rem; margin-bottom: 1.5rem; }
.widget h3 { margin-bottom: 0.5rem; }
.widget ul { list-style: none; }

.site-footer { border-top: 1px solid var(--border-color); padding: 1.5rem 0; text-align: center; color: var(--text-muted); }

@media (max-width: 768px) {
    .content-wrapper.with-sidebar { grid-template-columns: 1fr; }
    .posts-grid.cols-2, .posts-grid.cols-3, .posts-grid.cols-4 { grid-template-columns: 1fr; }
}
"##;

const MAIN_JS: &str = r##"document.addEventListener('DOMContentLoaded', function () {
    var toggle = document.getElementById('dark-mode-toggle');
    if (toggle) {
        toggle.addEventListener('click', function () {
            document.body.classList.toggle('dark-mode');
            localStorage.setItem('darkMode', document.body.classList.contains('dark-mode'));
        });
    }
    var saved = localStorage.getItem('darkMode');
    if (saved !== null) {
        document.body.classList.toggle('dark-mode', saved === 'true');
    }
});
"##;

const MESSAGES_EN: &str = "nav.home=Home
index.latestPosts=Latest Posts
index.noPosts=No posts yet.
pagination.previous=Previous
pagination.next=Next
post.tags=Tags:
post.comments=Comments
post.views=Views
sidebar.categories=Categories
sidebar.tags=Tags
sidebar.recentPosts=Recent Posts
";

const MESSAGES_ZH_CN: &str = "nav.home=\\u9996\\u9875
index.latestPosts=最新文章
index.noPosts=暂无文章
pagination.previous=上一页
pagination.next=下一页
post.tags=标签：
post.comments=评论
post.views=阅读
sidebar.categories=分类
sidebar.tags=标签
sidebar.recentPosts=最新文章
";

const FILES: &[(&str, &str)] = &[
    ("theme.yaml", MANIFEST),
    ("templates/layout.html", LAYOUT),
    ("templates/index.html", INDEX),
    ("templates/post.html", POST),
    ("templates/fragments/sidebar.html", SIDEBAR),
    ("templates/fragments/head.html", HEAD),
    ("static/css/style.css", STYLE_CSS),
    ("static/js/main.js", MAIN_JS),
    ("i18n/messages_en.properties", MESSAGES_EN),
    ("i18n/messages_zh_CN.properties", MESSAGES_ZH_CN),
];

/// Writes the built-in theme into `dir` (usually `website/themes/default`).
pub fn write_to(dir: &Path) -> Result<(), String> {
    for (rel, contents) in FILES {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("{}: {}", parent.display(), e))?;
        }
        fs::write(&path, contents).map_err(|e| format!("{}: {}", path.display(), e))?;
    }
    log::info!("[theme] default theme written to {}", dir.display());
    Ok(())
}
