pub const MAIN_TEXT: &str = r#"() => {
    const main = document.querySelector('main') || document.body;
    const clone = main.cloneNode(true);
    clone.querySelectorAll('[data-dynamic], .timestamp, time').forEach(el => el.remove());
    return clone.textContent || '';
}"#;

pub const PAGE_CONTEXT: &str = r#"() => {
    const texts = [];
    const grab = (sel) => Array.from(document.querySelectorAll(sel)).forEach(el => {
        const t = (el.innerText || '').trim();
        if (t) texts.push(t);
    });
    grab('nav[aria-label*="breadcrumb" i] a');
    grab('[class*="eyebrow" i], .eyebrow, .topic-eyebrow, .badge, .category, .section-eyebrow');
    grab('main header h1, main header h2, main h1');
    return texts.join('\n').slice(0, 4000);
}"#;

pub const MAIN_HTML: &str = r#"() => {
    const pick = () => {
        const main = document.querySelector('main');
        if (main) return main.cloneNode(true);
        const candidates = [
            '#main', '.main', '#content', '.content', 'article',
            '[role="main"]', 'div[aria-label*="content" i]'
        ];
        for (const sel of candidates) {
            const el = document.querySelector(sel);
            if (el) return el.cloneNode(true);
        }
        return document.body.cloneNode(true);
    };
    const root = pick();
    root.querySelectorAll('nav, footer, aside, header .breadcrumbs, script, style, noscript').forEach(el => el.remove());
    root.querySelectorAll('[class*="share" i], [data-social], [aria-label*="share" i]').forEach(el => el.remove());
    root.querySelectorAll('img[loading], img[data-src], img[srcset]').forEach(img => {
        img.removeAttribute('loading');
        img.removeAttribute('srcset');
    });
    return root.innerHTML;
}"#;

/// Keeps figures and captions on one page and starts the
/// resources/related/see-also block on a fresh page.
pub const PAGE_BREAKS: &str = r#"() => {
    const avoidBreak = (el) => {
        el.style.pageBreakInside = 'avoid';
        el.style.breakInside = 'avoid';
    };
    const wrapImageWithCaption = (img) => {
        const wrapper = document.createElement('div');
        avoidBreak(wrapper);
        wrapper.style.margin = '1em 0';
        wrapper.style.display = 'flex';
        wrapper.style.flexDirection = 'column';
        wrapper.setAttribute('data-image-wrapper', 'true');

        const caption = img.closest('figure')?.querySelector('figcaption') ||
            (img.nextElementSibling?.matches('.caption, [class*="caption"]') ? img.nextElementSibling : null) ||
            img.closest('dt')?.nextElementSibling;
        const container = img.closest('figure') || img.parentElement;

        if (container && container.parentNode) {
            avoidBreak(container);
            if (!container.parentElement?.hasAttribute('data-image-wrapper')) {
                container.parentNode.insertBefore(wrapper, container);
                wrapper.appendChild(container);
            }
        } else if (img.parentNode) {
            img.parentNode.insertBefore(wrapper, img);
            wrapper.appendChild(img);
            if (caption) wrapper.appendChild(caption);
        }
    };
    const moveResourcesToNewPage = () => {
        const headings = Array.from(document.querySelectorAll('h1, h2, h3, h4, h5, h6'));
        const heading = headings.find(h => {
            const t = h.textContent.toLowerCase();
            return t.includes('resource') || t.includes('related') || t.includes('see also');
        });
        if (!heading || !heading.parentNode) return false;
        const wrapper = document.createElement('div');
        wrapper.style.pageBreakBefore = 'always';
        wrapper.style.breakBefore = 'page';
        const nodes = [];
        let current = heading;
        while (current) {
            const next = current.nextElementSibling;
            nodes.push(current);
            if (next && next.matches('h1')) break;
            current = next;
        }
        heading.parentNode.insertBefore(wrapper, heading);
        nodes.forEach(node => wrapper.appendChild(node));
        return true;
    };

    document.querySelectorAll('img, [role="img"], svg').forEach(wrapImageWithCaption);
    document.querySelectorAll('.graphics-container, [class*="figure"], [class*="image"]').forEach(avoidBreak);
    return moveResourcesToNewPage();
}"#;

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_owned()).to_string()
}

pub fn expand_collapsed(scope: &str) -> String {
    format!(
        r#"() => {{
    const root = document.querySelector({scope});
    if (!root) return 0;
    let clicked = 0;
    root.querySelectorAll('[aria-expanded="false"]').forEach(toggle => {{
        try {{ toggle.click(); clicked += 1; }} catch (e) {{}}
    }});
    return clicked;
}}"#,
        scope = js_string(scope),
    )
}

pub fn collect_links(scope: Option<&str>, label_selector: &str) -> String {
    let scope = scope.map(js_string).unwrap_or_else(|| "null".to_owned());
    format!(
        r#"() => {{
    const scope = {scope};
    const root = scope ? document.querySelector(scope) : document;
    if (!root) return [];
    return Array.from(root.querySelectorAll('a[href]')).map(a => {{
        const label = a.querySelector({label}) || a;
        return {{ href: a.getAttribute('href') || '', title: (label.innerText || '').trim() }};
    }});
}}"#,
        label = js_string(label_selector),
    )
}

pub fn scroll_by(scope: Option<&str>, delta: i64) -> String {
    let scope = scope.map(js_string).unwrap_or_else(|| "null".to_owned());
    format!(
        r#"() => {{
    const scope = {scope};
    const el = scope ? document.querySelector(scope) : (document.scrollingElement || document.documentElement);
    if (!el) return {{ top: 0, height: 0 }};
    const delta = {delta} === 0 ? window.innerHeight : {delta};
    if (scope) {{ el.scrollBy(0, delta); }} else {{ window.scrollBy(0, delta); }}
    return {{ top: Math.round(el.scrollTop), height: Math.round(el.scrollHeight) }};
}}"#,
    )
}

pub fn scroll_to_edge(scope: Option<&str>, to_end: bool) -> String {
    let scope = scope.map(js_string).unwrap_or_else(|| "null".to_owned());
    format!(
        r#"() => {{
    const scope = {scope};
    const el = scope ? document.querySelector(scope) : (document.scrollingElement || document.documentElement);
    if (!el) return {{ top: 0, height: 0 }};
    el.scrollTo(0, {to_end} ? el.scrollHeight : 0);
    return {{ top: Math.round(el.scrollTop), height: Math.round(el.scrollHeight) }};
}}"#,
    )
}
